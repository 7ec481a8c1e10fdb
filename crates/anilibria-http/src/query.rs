//! Query parameters for title lookups.

/// Parameters of `GET /title`.
///
/// At least one of `id` or `code` must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TitleQuery {
    /// Title id.
    pub id: Option<i64>,
    /// Title URL slug.
    pub code: Option<String>,
    /// Look the title up by one of its torrents.
    pub torrent_id: Option<i64>,
    /// Only return these fields (dotted paths, e.g. `names.ru`).
    pub filter: Vec<String>,
    /// Omit these fields.
    pub remove: Vec<String>,
}

impl TitleQuery {
    /// Query by id.
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Query by URL slug.
    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Whether the query can identify a title.
    pub fn is_addressable(&self) -> bool {
        self.id.is_some() || self.code.is_some() || self.torrent_id.is_some()
    }

    /// Encode as query-string pairs. Lists are comma-joined; unset fields are omitted.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = self.id {
            params.push(("id", id.to_string()));
        }
        if let Some(code) = &self.code {
            params.push(("code", code.clone()));
        }
        if let Some(torrent_id) = self.torrent_id {
            params.push(("torrent_id", torrent_id.to_string()));
        }
        if !self.filter.is_empty() {
            params.push(("filter", self.filter.join(",")));
        }
        if !self.remove.is_empty() {
            params.push(("remove", self.remove.join(",")));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_id_params() {
        assert_eq!(TitleQuery::by_id(5).to_params(), vec![("id", "5".to_string())]);
    }

    #[test]
    fn lists_are_comma_joined() {
        let query = TitleQuery {
            filter: vec!["id".into(), "names.ru".into()],
            remove: vec!["torrents".into()],
            ..TitleQuery::by_code("bocchi-the-rock")
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("code", "bocchi-the-rock".to_string()),
                ("filter", "id,names.ru".to_string()),
                ("remove", "torrents".to_string()),
            ]
        );
    }

    #[test]
    fn empty_query_is_not_addressable() {
        assert!(!TitleQuery::default().is_addressable());
        assert!(TitleQuery::by_id(1).is_addressable());
    }
}
