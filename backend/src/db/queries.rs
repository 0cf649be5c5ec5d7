//! Query Catalog: the fixed report and maintenance statements.
//!
//! These are constants, run without parameters. Nothing here is built from
//! user input.

/// Domains kept by [`PURGE_UNLISTED_DOMAINS`].
pub const ALLOWED_DOMAINS: [&str; 3] = ["gmail.com", "yahoo.com", "example.com"];

/// A named catalog statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const SIGNUPS_BY_DATE: CatalogQuery = CatalogQuery {
    name: "signups_by_date",
    description: "Number of signups per day, newest first",
    sql: concat!(
        "SELECT signup_date, COUNT(*) AS user_count FROM users ",
        "GROUP BY signup_date ",
        "ORDER BY signup_date DESC"
    ),
};

pub const DISTINCT_DOMAINS: CatalogQuery = CatalogQuery {
    name: "distinct_domains",
    description: "Every email domain present",
    sql: "SELECT DISTINCT domain FROM users ORDER BY domain",
};

pub const RECENT_SIGNUPS: CatalogQuery = CatalogQuery {
    name: "recent_signups",
    description: "Users who signed up in the last 7 days",
    sql: concat!(
        "SELECT * FROM users ",
        "WHERE signup_date >= CURRENT_DATE - INTERVAL '7 days' ",
        "ORDER BY signup_date DESC"
    ),
};

pub const TOP_DOMAIN_MEMBERS: CatalogQuery = CatalogQuery {
    name: "top_domain_members",
    description: "Members of the single most common domain",
    sql: concat!(
        "WITH domain_count AS (",
        "SELECT domain, COUNT(*) AS domain_count FROM users ",
        "GROUP BY domain ",
        "ORDER BY domain_count DESC, domain ",
        "LIMIT 1) ",
        "SELECT u.name, u.email, u.domain FROM users u ",
        "JOIN domain_count dc ON u.domain = dc.domain"
    ),
};

pub const PURGE_UNLISTED_DOMAINS: CatalogQuery = CatalogQuery {
    name: "purge_unlisted_domains",
    description: "Delete users whose domain is not allow-listed",
    sql: "DELETE FROM users WHERE domain NOT IN ('gmail.com', 'yahoo.com', 'example.com')",
};

/// The catalog, in execution order.
pub const CATALOG: [CatalogQuery; 5] = [
    SIGNUPS_BY_DATE,
    DISTINCT_DOMAINS,
    RECENT_SIGNUPS,
    TOP_DOMAIN_MEMBERS,
    PURGE_UNLISTED_DOMAINS,
];

/// Look a catalog statement up by name.
pub fn find_query(name: &str) -> Option<&'static CatalogQuery> {
    CATALOG.iter().find(|q| q.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = CATALOG.iter().map(|q| q.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_find_query() {
        assert_eq!(find_query("distinct_domains"), Some(&DISTINCT_DOMAINS));
        assert!(find_query("drop_everything").is_none());
    }

    #[test]
    fn test_purge_matches_allow_list() {
        for domain in ALLOWED_DOMAINS {
            assert!(
                PURGE_UNLISTED_DOMAINS.sql.contains(&format!("'{}'", domain)),
                "{domain} missing from purge statement"
            );
        }
        assert_eq!(PURGE_UNLISTED_DOMAINS.sql.matches('\'').count(), ALLOWED_DOMAINS.len() * 2);
    }

    #[test]
    fn test_catalog_is_parameterless() {
        for query in CATALOG {
            assert!(!query.sql.contains('$'), "{} takes parameters", query.name);
        }
    }
}
