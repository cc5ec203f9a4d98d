//! Lists networks and round-trips an object through object storage.
//!
//! Reads the tenant token and service endpoints from the environment:
//!
//! ```text
//! STRATUS_TOKEN=gAAAAABk... \
//! STRATUS_COMPUTE_URL=https://compute.example.com/v2/tenant \
//! STRATUS_OBJECT_STORE_URL=https://swift.example.com/v1/AUTH_tenant \
//! cargo run --example basic_call
//! ```

use stratus::services::{self, Compute, ListOptions, ObjectStore};
use stratus::{Client, Error, ErrorDetail};

fn env(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::ConfigurationError(format!("{name} is not set")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("stratus=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .auth_token(env("STRATUS_TOKEN")?)
        .endpoint(services::COMPUTE, env("STRATUS_COMPUTE_URL")?)?
        .endpoint(services::OBJECT_STORE, env("STRATUS_OBJECT_STORE_URL")?)?
        .build()?;

    println!("=== Networks ===");
    let compute = Compute::new(client.clone());
    for network in compute.list_networks().await? {
        println!(
            "{} {} {}",
            network.id,
            network.label,
            network.cidr.as_deref().unwrap_or("-")
        );
    }
    println!();

    println!("=== Object round trip ===");
    let store = ObjectStore::new(client);
    store.create_container("stratus-demo").await?;
    store
        .put_object("stratus-demo", "hello.txt", b"hello from stratus".to_vec())
        .await?;

    let data = store.get_object("stratus-demo", "hello.txt").await?;
    println!("read back: {}", String::from_utf8_lossy(&data));
    println!("public URL: {}", store.url("stratus-demo", "hello.txt")?);

    let listing = store
        .list("stratus-demo", ListOptions::default())
        .await?;
    for entry in &listing {
        println!("{} ({} bytes, {})", entry.name, entry.length_bytes, entry.content_type);
    }
    println!();

    println!("=== Error details ===");
    match store.get_object("stratus-demo", "missing.txt").await {
        Ok(_) => println!("unexpectedly found missing.txt"),
        Err(e) => {
            println!("status: {:?}", e.status());
            match e.error_detail() {
                Some(ErrorDetail::Structured(detail)) => {
                    println!("{} {}: {}", detail.code, detail.title, detail.message)
                }
                Some(ErrorDetail::Raw(body)) => {
                    println!("raw body: {}", String::from_utf8_lossy(body))
                }
                None => println!("no response: {e}"),
            }
        }
    }

    store.delete_object("stratus-demo", "hello.txt").await?;
    store.delete_container("stratus-demo").await?;

    Ok(())
}
