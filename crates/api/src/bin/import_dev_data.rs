//! Load or wipe the development data set.
//!
//! ```text
//! natours-import --import [--dir dev-data/data]
//! natours-import --delete
//! ```
//!
//! Reads `tours.json`, `users.json` and `reviews.json` from `--dir`. Ids in
//! the files are kept so references between them stay valid. Every imported
//! user gets `--password` (hashed) so the accounts can log in.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use natours_core::types::{Document, ID_FIELD};
use natours_db::models::{Model, Review, Tour, User};
use natours_db::DocumentStore;
use natours_db::PgStore;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use natours_api::auth::password::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Load the data set.
    #[arg(long, conflicts_with = "delete")]
    import: bool,

    /// Remove every tour, user and review.
    #[arg(long)]
    delete: bool,

    /// Directory holding the JSON files.
    #[arg(long, default_value = "dev-data/data")]
    dir: PathBuf,

    /// Password given to every imported user.
    #[arg(long, default_value = "test1234")]
    password: String,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natours_import=info,natours_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if !args.import && !args.delete {
        bail!("nothing to do: pass --import or --delete");
    }

    let pool = natours_db::create_pool(&args.database_url)
        .await
        .context("connecting to the database")?;
    natours_db::run_migrations(&pool)
        .await
        .context("running migrations")?;
    let store = PgStore::new(pool);

    if args.delete {
        delete_all(&store).await?;
        tracing::info!("Data deleted successfully");
    } else {
        import_all(&store, &args.dir, &args.password).await?;
        tracing::info!("Data loaded successfully");
    }
    Ok(())
}

async fn import_all(store: &dyn DocumentStore, dir: &Path, password: &str) -> anyhow::Result<()> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;

    let tours = read_documents(&dir.join("tours.json"))?;
    let count = insert_all::<Tour>(store, tours, |_| {}).await?;
    tracing::info!(count, "Tours imported");

    let users = read_documents(&dir.join("users.json"))?;
    let count = insert_all::<User>(store, users, |user| {
        user.insert("password".into(), Value::String(password_hash.clone()));
    })
    .await?;
    tracing::info!(count, "Users imported");

    let reviews = read_documents(&dir.join("reviews.json"))?;
    let count = insert_all::<Review>(store, reviews, |_| {}).await?;
    tracing::info!(count, "Reviews imported");
    Ok(())
}

async fn delete_all(store: &dyn DocumentStore) -> anyhow::Result<()> {
    for collection in [Tour::COLLECTION, User::COLLECTION, Review::COLLECTION] {
        let removed = store.collection(collection).delete_many(&[]).await?;
        tracing::info!(collection, removed, "Collection cleared");
    }
    Ok(())
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let docs: Vec<Document> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(docs)
}

/// Validate each document through the model and insert it under its
/// original id.
async fn insert_all<M: Model>(
    store: &dyn DocumentStore,
    docs: Vec<Document>,
    adjust: impl Fn(&mut Document),
) -> anyhow::Result<usize> {
    let collection = store.collection(M::COLLECTION);
    let mut inserted = 0;
    for mut raw in docs {
        adjust(&mut raw);
        let id = raw.get(ID_FIELD).cloned();

        let mut model = M::from_document(&raw)
            .with_context(|| format!("{} {}", M::ENTITY, describe(&id)))?;
        model
            .check()
            .with_context(|| format!("{} {}", M::ENTITY, describe(&id)))?;
        model.prepare();

        let mut doc = model.to_document()?;
        if let Some(id) = id {
            doc.insert(ID_FIELD.into(), id);
        }
        collection.create(doc).await?;
        inserted += 1;
    }
    Ok(inserted)
}

fn describe(id: &Option<Value>) -> String {
    id.as_ref()
        .and_then(Value::as_str)
        .unwrap_or("without id")
        .to_string()
}
