use bson::{Bson, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use docrest_core::{
    attachment::AttachmentUpload,
    bulk::BulkMode,
    document::{Document, Patch, RecordId},
    error::DocumentStoreError,
    page::PaginationParams,
    query::Filter,
    store::DocumentStore,
};
use docrest_memory::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Movie {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    director: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poster: Option<ObjectId>,
}

impl Document for Movie {
    fn collection_name() -> &'static str {
        "movies"
    }
}

fn movie(title: &str, year: i32) -> Movie {
    Movie {
        title: title.to_string(),
        year: Some(year),
        rated: Some("5".to_string()),
        director: None,
        poster: None,
    }
}

fn poster_upload() -> AttachmentUpload {
    AttachmentUpload::new("poster.png", Some("image/png".to_string()), vec![0x89, b'P', b'N', b'G'])
}

#[tokio::test]
async fn created_record_reads_back() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();

    let created = movies
        .insert_one(movie("Spider Man 3", 2009))
        .await
        .unwrap();
    let fetched = movies.find_by_id(&created.id).await.unwrap();

    assert_eq!(fetched, created);
    assert!(matches!(created.id, RecordId::ObjectId(_)));
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();

    let err = movies
        .find_by_id(&RecordId::parse("nonexistent"))
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));
}

#[tokio::test]
async fn deleted_record_is_gone() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    let created = movies
        .insert_one(movie("Spider Man 3", 2009))
        .await
        .unwrap();

    movies.delete_one(&created.id).await.unwrap();

    assert!(movies.find_by_id(&created.id).await.unwrap_err().is_not_found());
    assert!(movies.delete_one(&created.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn typed_update_must_keep_the_schema() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    let created = movies
        .insert_one(movie("Spider Man 3", 2009))
        .await
        .unwrap();

    let err = movies
        .update_one(&created.id, Patch::new(doc! { "year": "not a year" }).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Validation { .. }));

    movies
        .update_one(&created.id, Patch::new(doc! { "year": 2016 }).unwrap())
        .await
        .unwrap();
    let fetched = movies.find_by_id(&created.id).await.unwrap();
    assert_eq!(fetched.document.year, Some(2016));
    assert_eq!(fetched.document.title, "Spider Man 3");
}

#[tokio::test]
async fn typed_patch_is_stored_the_way_inserts_store_it() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    let director = ObjectId::new();

    let titanic = movies
        .insert_one(Movie { director: Some(director), ..movie("Titanic", 1997) })
        .await
        .unwrap();
    let avatar = movies.insert_one(movie("Avatar", 2009)).await.unwrap();

    movies
        .update_one(&avatar.id, Patch::new(doc! { "director": director.to_hex() }).unwrap())
        .await
        .unwrap();

    let raw = store.collection("movies").find_by_id(&avatar.id).await.unwrap();
    assert_eq!(raw.fields.get("director"), Some(&Bson::ObjectId(director)));

    let directed = movies
        .find(Some(Filter::eq("director", director)))
        .await
        .unwrap()
        .into_iter()
        .map(|stored| stored.id)
        .collect::<Vec<_>>();
    assert_eq!(directed, vec![titanic.id, avatar.id]);
}

#[tokio::test]
async fn typed_update_many_writes_declared_widths_and_clears_options() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();

    for title in ["Avatar", "Up"] {
        movies.insert_one(movie(title, 2009)).await.unwrap();
    }

    let updated = movies
        .update_many(
            Filter::eq("year", 2009),
            Patch::new(doc! { "year": 2010_i64, "rated": Bson::Null }).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);

    for id in &updated {
        let raw = store.collection("movies").find_by_id(id).await.unwrap();
        assert_eq!(raw.fields.get("year"), Some(&Bson::Int32(2010)));
        assert_eq!(raw.fields.get("rated"), Some(&Bson::Null));
        assert_eq!(movies.find_by_id(id).await.unwrap().document.rated, None);
    }
}

#[tokio::test]
async fn update_many_reports_matches_taken_before_the_update() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    for title in ["One", "Two"] {
        movies
            .insert_one(movie(title, 2010))
            .await
            .unwrap();
    }
    movies
        .insert_one(movie("Other", 2011))
        .await
        .unwrap();

    let touched = movies
        .update_many(Filter::eq("year", 2010), Patch::new(doc! { "year": 2020 }).unwrap())
        .await
        .unwrap();

    assert_eq!(touched.len(), 2);
    assert!(movies.find_by_field("year", 2010).await.unwrap().is_empty());
    assert_eq!(movies.find_by_field("year", 2020).await.unwrap().len(), 2);

    let none = movies
        .update_many(Filter::eq("year", 1900), Patch::new(doc! { "year": 1 }).unwrap())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn delete_many_returns_deleted_keys() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    let kept = movies
        .insert_one(movie("Kept", 2011))
        .await
        .unwrap();
    for title in ["One", "Two", "Three"] {
        movies
            .insert_one(movie(title, 2010))
            .await
            .unwrap();
    }

    let deleted = movies
        .delete_many(Filter::eq("year", 2010))
        .await
        .unwrap();

    assert_eq!(deleted.len(), 3);
    assert_eq!(
        movies.find(None).await.unwrap().into_iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![kept.id]
    );
}

#[tokio::test]
async fn paginates_in_store_order() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    for year in 2000..2012 {
        movies
            .insert_one(movie(&format!("Movie {year}"), year))
            .await
            .unwrap();
    }

    let page = movies
        .paginate(PaginationParams::new(3, 5), None)
        .await
        .unwrap();

    assert_eq!(page.count, 12);
    assert_eq!(
        page.items.iter().map(|m| m.document.year).collect::<Vec<_>>(),
        vec![Some(2010), Some(2011)]
    );
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(2));
}

#[tokio::test]
async fn embedded_fields_round_trip() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.collection("movies");

    let created = movies
        .insert_one(doc! {
            "title": "Movie with embedded doc",
            "imdb": { "imdb_id": "12340mov", "rating": 4.2, "votes": 7 },
            "cast": [{ "name": "Ada", "role": "lead" }],
        })
        .await
        .unwrap();

    let found = movies
        .find_by_field("imdb.imdb_id", "12340mov")
        .await
        .unwrap();

    assert_eq!(found, vec![created.clone()]);
    assert_eq!(
        found[0].fields.get_document("imdb").unwrap().get_f64("rating").unwrap(),
        4.2
    );
}

#[tokio::test]
async fn insert_one_keeps_existing_record_on_duplicate() {
    let store = DocumentStore::new(InMemoryStore::new());
    let todos = store.collection("todos");
    todos
        .insert_one(doc! { "_id": 1, "title": "first" })
        .await
        .unwrap();

    let err = todos
        .insert_one(doc! { "_id": 1, "title": "second" })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DuplicateKey { .. }));
    assert_eq!(
        todos.find_by_id(&RecordId::Int(1)).await.unwrap().fields.get_str("title").unwrap(),
        "first"
    );
}

#[tokio::test]
async fn continue_mode_accounts_for_every_input() {
    let store = DocumentStore::new(InMemoryStore::new());
    let todos = store.collection("todos");
    todos
        .insert_many(
            vec![doc! { "_id": 1, "title": "todo title one " }, doc! { "_id": 2, "title": "todo title two" }],
            BulkMode::StopOnDuplicate,
        )
        .await
        .unwrap();

    let inputs = vec![
        doc! { "_id": 1, "title": "todo title one ", "body": "todo body one " },
        doc! { "_id": 8, "title": "todo title two", "body": "todo body two" },
        doc! { "_id": 2, "title": "todo title three", "body": "todo body three" },
    ];
    let report = todos
        .insert_many(inputs.clone(), BulkMode::ContinueOnDuplicate)
        .await
        .unwrap();

    assert_eq!(report.inserted_count() + report.duplicates.len(), inputs.len());
    assert_eq!(report.inserted_ids, vec![RecordId::Int(8)]);
    assert_eq!(report.duplicates[0].input, inputs[0]);
    assert_eq!(report.duplicates[1].input, inputs[2]);
    assert_eq!(report.not_attempted, 0);
    assert_eq!(todos.find(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn stop_mode_leaves_the_rest_untried() {
    let store = DocumentStore::new(InMemoryStore::new());
    let todos = store.collection("todos");
    todos
        .insert_one(doc! { "_id": 2, "title": "existing" })
        .await
        .unwrap();

    let report = todos
        .insert_many(
            vec![
                doc! { "_id": 1, "title": "a" },
                doc! { "_id": 2, "title": "b" },
                doc! { "_id": 3, "title": "c" },
            ],
            BulkMode::StopOnDuplicate,
        )
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.inserted_ids, vec![RecordId::Int(1)]);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.not_attempted, 1);
    assert!(todos.find_one(&RecordId::Int(3)).await.unwrap().is_none());
}

#[tokio::test]
async fn replace_respects_upsert_flag() {
    let store = DocumentStore::new(InMemoryStore::new());
    let todos = store.collection("todos");

    let err = todos
        .replace_one(&RecordId::Int(5), doc! { "_id": 6, "title": "x" }, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Validation { .. }));

    let missed = todos
        .replace_one(&RecordId::Int(5), doc! { "title": "x" }, false)
        .await
        .unwrap();
    assert_eq!((missed.matched, missed.upserted), (0, false));

    let upserted = todos
        .replace_one(&RecordId::Int(5), doc! { "title": "x" }, true)
        .await
        .unwrap();
    assert!(upserted.upserted);

    let replaced = todos
        .replace_one(&RecordId::Int(5), doc! { "body": "only body" }, false)
        .await
        .unwrap();
    assert_eq!(replaced.matched, 1);

    let record = todos.find_by_id(&RecordId::Int(5)).await.unwrap();
    assert_eq!(record.fields, doc! { "body": "only body" });
}

#[tokio::test]
async fn find_and_modify_return_the_record_as_it_was() {
    let store = DocumentStore::new(InMemoryStore::new());
    let todos = store.collection("todos");
    todos
        .insert_one(doc! { "_id": 1, "title": "first", "done": false })
        .await
        .unwrap();

    let before = todos
        .find_one_and_update(&RecordId::Int(1), Patch::new(doc! { "done": true }).unwrap())
        .await
        .unwrap();
    assert_eq!(before.fields.get("done"), Some(&Bson::Boolean(false)));

    let before = todos
        .find_one_and_replace(&RecordId::Int(1), doc! { "title": "replaced" })
        .await
        .unwrap();
    assert_eq!(before.fields, doc! { "title": "first", "done": true });

    let before = todos.find_one_and_delete(&RecordId::Int(1)).await.unwrap();
    assert_eq!(before.fields, doc! { "title": "replaced" });
    assert!(todos.find_one(&RecordId::Int(1)).await.unwrap().is_none());

    let missing = todos
        .find_one_and_replace(&RecordId::Int(1), doc! { "title": "ghost" })
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
    assert!(todos.find_one(&RecordId::Int(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn files_are_found_by_their_latest_name() {
    let store = DocumentStore::new(InMemoryStore::new());
    let files = store.attachments();

    files
        .put(AttachmentUpload::new("notes.txt", None, b"first".to_vec()))
        .await
        .unwrap();
    let latest = files
        .put(AttachmentUpload::new("notes.txt", Some("text/plain".to_string()), b"second".to_vec()))
        .await
        .unwrap();

    let found = files.get_by_name("notes.txt").await.unwrap();
    assert_eq!(found.info.id, latest);
    assert_eq!(found.data, b"second".to_vec());

    let err = files.get_by_name("missing.txt").await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::AttachmentNotFound(ref name) if name == "missing.txt"));
}

#[tokio::test]
async fn attachment_lives_and_dies_with_its_record() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();

    let created = movies
        .insert_with_attachment(movie("movie with poster", 2021), "poster", poster_upload())
        .await
        .unwrap();
    let poster = created.document.poster.unwrap();

    let attachment = movies.read_attachment(&created.id, "poster").await.unwrap();
    assert_eq!(attachment.data, poster_upload().data);
    assert_eq!(attachment.info.content_type, "image/png");
    assert_eq!(attachment.info.id, poster);

    movies
        .delete_with_attachment(&created.id, "poster")
        .await
        .unwrap();

    assert!(movies.find_by_id(&created.id).await.unwrap_err().is_not_found());
    assert!(store.attachments().get(poster).await.unwrap().is_none());
}

#[tokio::test]
async fn plain_delete_leaves_the_attachment_behind() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();
    let created = movies
        .insert_one(movie("movie with poster", 2021))
        .await
        .unwrap();

    let updated = movies
        .store_attachment(&created.id, "poster", poster_upload())
        .await
        .unwrap();
    let poster = updated.document.poster.unwrap();

    movies.delete_one(&created.id).await.unwrap();

    assert!(store.attachments().get(poster).await.unwrap().is_some());
}

#[tokio::test]
async fn attachment_errors() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.typed_collection::<Movie>();

    let err = movies
        .store_attachment(&RecordId::generate(), "poster", poster_upload())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::DocumentNotFound(..)));

    let created = movies
        .insert_one(movie("no poster", 2021))
        .await
        .unwrap();
    let err = movies
        .read_attachment(&created.id, "poster")
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::AttachmentNotFound(_)));

    movies
        .store_attachment(&created.id, "poster", poster_upload())
        .await
        .unwrap();
    let err = movies
        .store_attachment(&created.id, "poster", poster_upload())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Validation { .. }));
}

#[tokio::test]
async fn orphaned_reference_is_attachment_not_found() {
    let store = DocumentStore::new(InMemoryStore::new());
    let movies = store.collection("movies");
    let created = movies
        .insert_one(doc! { "title": "dangling", "poster": Bson::ObjectId(ObjectId::new()) })
        .await
        .unwrap();

    let err = movies
        .read_attachment(&created.id, "poster")
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::AttachmentNotFound(_)));
}
