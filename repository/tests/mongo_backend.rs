#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use anyhow::Result;
use mongodb::bson::{doc, Document};
use repository::crypto::hash;
use repository::{Backend, MongoRepo, ReadOptions, Repos, WriteOptions};
use serde_json::json;
use shared_types::{MongoOptions, ReadOutcome};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mongo::Mongo;

const DB_NAME: &str = "repository-test";

async fn setup_mongo() -> Result<(ContainerAsync<Mongo>, String)> {
    let container = Mongo::default().start().await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(27017).await?;
    let db_url = format!("mongodb://{host}:{port}");

    Ok((container, db_url))
}

fn mongo_repo(db_url: &str) -> MongoRepo {
    MongoRepo::new(MongoOptions {
        db_url: db_url.to_string(),
        db_name: DB_NAME.to_string(),
    })
}

#[tokio::test]
async fn test_mongo_write_then_overwrite() -> Result<()> {
    let (_container, db_url) = setup_mongo().await?;
    let repo = mongo_repo(&db_url);

    assert!(repo.write_file("notes/a.txt", "first".to_string()).await.is_ok());
    assert!(repo.write_file("notes/a.txt", "second".to_string()).await.is_ok());

    assert_eq!(
        repo.read_file("notes/a.txt").await,
        ReadOutcome::found("second")
    );
    Ok(())
}

#[tokio::test]
async fn test_mongo_missing_entry_is_not_found() -> Result<()> {
    let (_container, db_url) = setup_mongo().await?;
    let repo = mongo_repo(&db_url);

    // Neither the collection nor the document exists yet
    assert_eq!(repo.read_file("notes/a.txt").await, ReadOutcome::NotFound);

    // The collection exists, the document does not
    assert!(repo.write_file("notes/a.txt", "x".to_string()).await.is_ok());
    assert_eq!(repo.read_file("notes/b.txt").await, ReadOutcome::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_mongo_entries_land_in_folder_hash_collection() -> Result<()> {
    let (_container, db_url) = setup_mongo().await?;
    let repo = mongo_repo(&db_url);

    assert!(repo.write_file("notes/a.txt", "one".to_string()).await.is_ok());
    assert!(repo.write_file("notes/a.txt", "two".to_string()).await.is_ok());
    assert!(repo.write_file("top.txt", "root".to_string()).await.is_ok());

    let client = mongodb::Client::with_uri_str(&db_url).await?;
    let database = client.database(DB_NAME);

    let notes = database.collection::<Document>(&hash("notes"));
    assert_eq!(notes.count_documents(doc! {}).await?, 1);
    let stored = notes.find_one(doc! { "_id": "a.txt" }).await?.unwrap();
    assert_eq!(stored.get_str("content")?, "two");
    assert!(stored.get_datetime("updated_at").is_ok());

    let root = database.collection::<Document>(&hash("/"));
    let stored = root.find_one(doc! { "_id": "top.txt" }).await?.unwrap();
    assert_eq!(stored.get_str("content")?, "root");

    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_mongo_reconnects_after_close() -> Result<()> {
    let (_container, db_url) = setup_mongo().await?;
    let repo = mongo_repo(&db_url);

    assert!(repo.write_file("a/b.txt", "kept".to_string()).await.is_ok());
    repo.close().await;
    repo.close().await;

    assert_eq!(repo.read_file("a/b.txt").await, ReadOutcome::found("kept"));
    assert!(repo.write_file("a/b.txt", "again".to_string()).await.is_ok());
    assert_eq!(repo.read_file("a/b.txt").await, ReadOutcome::found("again"));
    Ok(())
}

#[tokio::test]
async fn test_mongo_unreachable_server_is_a_failure() -> Result<()> {
    let repo = MongoRepo::new(MongoOptions {
        db_url: "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200".to_string(),
        db_name: DB_NAME.to_string(),
    });

    assert!(matches!(
        repo.read_file("a.txt").await,
        ReadOutcome::Failed { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_mongo_repository_through_factory() -> Result<()> {
    let (_container, db_url) = setup_mongo().await?;

    let repository = Repos::new()
        .open_value(json!({
            "type": "mongo",
            "options": {"db_url": db_url, "db_name": DB_NAME}
        }))
        .await?;
    assert_eq!(repository.get_id(), format!("{}/{DB_NAME}", hash(&db_url)));

    repository
        .write("notes/secret.txt", "hello", &WriteOptions::encrypted("pw"))
        .await?;
    let content = repository
        .read("notes/secret.txt", &ReadOptions::decrypted("pw"))
        .await?;
    assert_eq!(content, "hello");

    repository.close().await;
    Ok(())
}
