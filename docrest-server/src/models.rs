//! Documents served over HTTP.

use bson::{Document as BsonDocument, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docrest_core::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Collection of the dynamic director records.
pub const DIRECTORS: &str = "director";
/// Collection of the raw todo records.
pub const TODOS: &str = "todos";
/// Field of [`Movie`] that references its poster attachment.
pub const POSTER_FIELD: &str = "poster";
/// Field of [`Movie`] the by-field routes filter on.
pub const BY_FIELD: &str = "year";

/// Ratings embedded in a movie, never stored on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Imdb {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<i32>,
}

impl Imdb {
    /// The listing attached by `POST /records/embedded`.
    pub fn placeholder() -> Self {
        Self {
            imdb_id: Some("12340mov".to_string()),
            rating: Some(4.2),
            votes: Some(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Movie {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
    /// Key of a record in the director collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<ObjectId>,
    /// Free-form cast entries.
    #[serde(default)]
    pub cast: Vec<BsonDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb: Option<Imdb>,
}

impl Movie {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            rated: None,
            director: None,
            cast: Vec::new(),
            poster: None,
            imdb: None,
        }
    }

    /// The movie created for a poster upload that came without metadata.
    pub fn poster_placeholder() -> Self {
        Self {
            year: Some(2021),
            ..Self::new("movie with poster")
        }
    }
}

/// Refuses a JSON body that writes the poster reference, as a whole or by path.
///
/// The reference is set by the attachment routes only, so that it always names an attachment
/// the movie owns.
pub fn reject_poster_write(body: &Value) -> DocumentStoreResult<()> {
    let writes_poster = body.as_object().is_some_and(|object| {
        object.keys().any(|key| {
            key == POSTER_FIELD
                || key
                    .strip_prefix(POSTER_FIELD)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    });

    if writes_poster {
        return Err(DocumentStoreError::invalid_field(
            POSTER_FIELD,
            "the poster is managed by the attachment routes",
        ));
    }

    Ok(())
}

impl Document for Movie {
    fn collection_name() -> &'static str {
        "movies"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrest_core::document::DocumentExt;
    use serde_json::json;

    #[test]
    fn unset_fields_are_not_stored() {
        let fields = Movie::new("Spider Man 3").to_fields().unwrap();

        assert_eq!(fields, bson::doc! { "title": "Spider Man 3", "cast": [] });
    }

    #[test]
    fn json_bodies_fill_embedded_records() {
        let movie = Movie::from_json(json!({
            "title": "Avatar",
            "year": 2009,
            "cast": [{ "name": "Sam Worthington" }],
            "imdb": { "imdb_id": "tt0499549", "votes": 1200 },
        }))
        .unwrap();

        assert_eq!(movie.year, Some(2009));
        assert_eq!(movie.cast, vec![bson::doc! { "name": "Sam Worthington" }]);
        assert_eq!(movie.imdb.and_then(|imdb| imdb.votes), Some(1200));
    }

    #[test]
    fn poster_writes_are_refused() {
        assert!(reject_poster_write(&json!({ "title": "Avatar", "year": 2009 })).is_ok());
        assert!(reject_poster_write(&json!({ "posters_seen": 3 })).is_ok());

        for body in [json!({ "poster": null }), json!({ "poster.$oid": "x" })] {
            let err = reject_poster_write(&body).unwrap_err();
            assert!(matches!(err, DocumentStoreError::Validation { field: Some(ref field), .. } if field == "poster"));
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Movie::from_json(json!({ "title": "Avatar", "budget": 237 })).is_err());
    }
}
