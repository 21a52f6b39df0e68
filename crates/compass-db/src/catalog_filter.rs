//! Catalog search filter query builder.
//!
//! Converts [`OrganizationSearchFilters`] into a parameterized SQL WHERE
//! clause fragment. Filters compose conjunctively; an empty filter set
//! produces `TRUE` so the fragment can always be spliced into a query.

use compass_core::OrganizationSearchFilters;

use crate::escape_like;

/// Type-safe parameter binding for dynamically built SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// String parameter.
    String(String),
    /// 64-bit integer parameter.
    Int(i64),
}

/// Generates SQL WHERE clause fragments for catalog search.
pub struct CatalogFilterQueryBuilder {
    filters: OrganizationSearchFilters,
    param_offset: usize,
}

impl CatalogFilterQueryBuilder {
    /// Create a new builder for the given filters.
    ///
    /// # Parameters
    ///
    /// * `filters` - The conjunctive search filters
    /// * `param_offset` - Number of parameters already in the query
    pub fn new(filters: OrganizationSearchFilters, param_offset: usize) -> Self {
        Self {
            filters,
            param_offset,
        }
    }

    /// Build the WHERE clause fragment.
    ///
    /// Returns the SQL fragment and the parameters in the order they appear.
    /// An empty filter set yields `("TRUE", [])`.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut param_idx = self.param_offset;

        if let Some(name) = &self.filters.name {
            param_idx += 1;
            clauses.push(format!("name ILIKE '%' || ${} || '%'", param_idx));
            params.push(QueryParam::String(escape_like(name)));
        }

        if let Some(ein) = &self.filters.ein {
            param_idx += 1;
            clauses.push(format!("ein = ${}", param_idx));
            params.push(QueryParam::String(ein.clone()));
        }

        if let Some(state) = &self.filters.state {
            param_idx += 1;
            clauses.push(format!("state = ${}", param_idx));
            params.push(QueryParam::String(state.clone()));
        }

        if let Some(city) = &self.filters.city {
            param_idx += 1;
            clauses.push(format!("city = ${}", param_idx));
            params.push(QueryParam::String(city.clone()));
        }

        if let Some(prefix) = &self.filters.ntee_prefix {
            param_idx += 1;
            clauses.push(format!("ntee_code->>'code' LIKE ${} || '%'", param_idx));
            params.push(QueryParam::String(escape_like(prefix)));
        }

        // Inclusive bounds, either one optional
        if let Some(min) = self.filters.asset_amt_min {
            param_idx += 1;
            clauses.push(format!("asset_amt >= ${}", param_idx));
            params.push(QueryParam::Int(min));
        }

        if let Some(max) = self.filters.asset_amt_max {
            param_idx += 1;
            clauses.push(format!("asset_amt <= ${}", param_idx));
            params.push(QueryParam::Int(max));
        }

        if clauses.is_empty() {
            ("TRUE".to_string(), vec![])
        } else {
            (clauses.join(" AND "), params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filters_yield_true() {
        let builder = CatalogFilterQueryBuilder::new(OrganizationSearchFilters::default(), 0);
        let (sql, params) = builder.build();
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_name_filter_escapes_wildcards() {
        let filters = OrganizationSearchFilters {
            name: Some("100%_fund".to_string()),
            ..Default::default()
        };
        let (sql, params) = CatalogFilterQueryBuilder::new(filters, 0).build();
        assert_eq!(sql, "name ILIKE '%' || $1 || '%'");
        assert_eq!(params, vec![QueryParam::String("100\\%\\_fund".to_string())]);
    }

    #[test]
    fn test_filters_compose_conjunctively() {
        let filters = OrganizationSearchFilters {
            state: Some("NY".to_string()),
            city: Some("Brooklyn".to_string()),
            ntee_prefix: Some("C".to_string()),
            ..Default::default()
        };
        let (sql, params) = CatalogFilterQueryBuilder::new(filters, 0).build();
        assert_eq!(
            sql,
            "state = $1 AND city = $2 AND ntee_code->>'code' LIKE $3 || '%'"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_single_asset_bound_allowed() {
        let filters = OrganizationSearchFilters {
            asset_amt_min: Some(1_000_000),
            ..Default::default()
        };
        let (sql, params) = CatalogFilterQueryBuilder::new(filters, 0).build();
        assert_eq!(sql, "asset_amt >= $1");
        assert_eq!(params, vec![QueryParam::Int(1_000_000)]);
    }

    #[test]
    fn test_both_asset_bounds_are_inclusive_range() {
        let filters = OrganizationSearchFilters {
            asset_amt_min: Some(10),
            asset_amt_max: Some(20),
            ..Default::default()
        };
        let (sql, _) = CatalogFilterQueryBuilder::new(filters, 0).build();
        assert_eq!(sql, "asset_amt >= $1 AND asset_amt <= $2");
    }

    #[test]
    fn test_param_offset_shifts_placeholders() {
        let filters = OrganizationSearchFilters {
            state: Some("CA".to_string()),
            ..Default::default()
        };
        let (sql, _) = CatalogFilterQueryBuilder::new(filters, 2).build();
        assert_eq!(sql, "state = $3");
    }
}
