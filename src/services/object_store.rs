//! Object storage operations: containers and the objects inside them.

use crate::{BinaryRequest, ByteStream, Client, JsonRequest, RequestOptions, Result};
use bytes::Bytes;
use futures_util::TryStream;
use reqwest::Body;
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;

/// One entry of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerContents {
    /// Object name.
    pub name: String,
    /// MD5 of the object contents.
    #[serde(default)]
    pub hash: String,
    /// Size in bytes.
    #[serde(rename = "bytes", default)]
    pub length_bytes: u64,
    /// Content type recorded for the object.
    #[serde(default)]
    pub content_type: String,
    /// Last modification time, as reported by the service.
    #[serde(default)]
    pub last_modified: String,
}

/// Filters for [`ObjectStore::list`]. Empty fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only objects whose names start with this prefix.
    pub prefix: String,
    /// Roll names up to the first occurrence of this delimiter after the prefix.
    pub delimiter: String,
    /// Only objects whose names sort after this marker.
    pub marker: String,
    /// Maximum number of entries; `0` leaves it to the service.
    pub limit: usize,
}

impl ListOptions {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for (key, value) in [
            ("prefix", self.prefix),
            ("delimiter", self.delimiter),
            ("marker", self.marker),
        ] {
            if !value.is_empty() {
                params.push((key.to_string(), value));
            }
        }
        if self.limit > 0 {
            params.push(("limit".to_string(), self.limit.to_string()));
        }
        params
    }
}

/// Access to the object-storage service of one tenant.
///
/// # Examples
///
/// ```no_run
/// use stratus::{services::ObjectStore, Client};
///
/// # async fn example() -> Result<(), stratus::Error> {
/// let client = Client::builder()
///     .auth_token("gAAAAABk...")
///     .endpoint("object-store", "https://swift.example.com/v1/AUTH_tenant")?
///     .build()?;
/// let store = ObjectStore::new(client);
///
/// store.create_container("backups").await?;
/// store.put_object("backups", "db.tar", b"...".to_vec()).await?;
/// let data = store.get_object("backups", "db.tar").await?;
/// assert_eq!(data, b"...");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
}

impl ObjectStore {
    /// Wraps a client that has an [`OBJECT_STORE`](super::OBJECT_STORE) endpoint registered.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a publicly readable container.
    pub async fn create_container(&self, container: &str) -> Result<()> {
        let result = async {
            let options = RequestOptions::new()
                .header("X-Container-Read", ".r:*")?
                .expect_status([StatusCode::ACCEPTED, StatusCode::CREATED]);
            let url = self.url(container, "")?;
            self.client
                .json_request(Method::PUT, &url, JsonRequest::with_options(options))
                .await
        }
        .await;
        result
            .map(drop)
            .map_err(|e| e.context(format!("failed to create container: {container}")))
    }

    /// Deletes an empty container.
    pub async fn delete_container(&self, container: &str) -> Result<()> {
        let result = async {
            let url = self.url(container, "")?;
            let options = RequestOptions::new().expect_status([StatusCode::NO_CONTENT]);
            self.client.delete(&url, options).await
        }
        .await;
        result
            .map(drop)
            .map_err(|e| e.context(format!("failed to delete container: {container}")))
    }

    /// Writes or overwrites an object.
    pub async fn put_object(
        &self,
        container: &str,
        object: &str,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        let options = RequestOptions::new().expect_status([StatusCode::CREATED]);
        let request = BinaryRequest::with_options(options).body(data);
        self.touch_object(Method::PUT, container, object, request)
            .await
            .map(drop)
    }

    /// Reads an object's contents.
    pub async fn get_object(&self, container: &str, object: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.touch_object(
            Method::GET,
            container,
            object,
            BinaryRequest::new().response(&mut data),
        )
        .await?;
        Ok(data)
    }

    /// Opens an object for reading. Chunks arrive as the server sends them.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures_util::TryStreamExt;
    /// # async fn example(store: stratus::services::ObjectStore) -> Result<(), stratus::Error> {
    /// let mut reader = store.get_reader("backups", "db.tar").await?;
    /// let mut total = 0;
    /// while let Some(chunk) = reader.try_next().await? {
    ///     total += chunk.len();
    /// }
    /// println!("{total} bytes");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_reader(&self, container: &str, object: &str) -> Result<ByteStream> {
        let result = async {
            let url = self.url(container, object)?;
            self.client
                .stream_request(Method::GET, &url, RequestOptions::new(), None)
                .await
        }
        .await;
        result
            .map(|(reader, _)| reader)
            .map_err(object_context(&Method::GET, container, object))
    }

    /// Writes or overwrites an object from a stream of chunks.
    ///
    /// The stream is consumed once; a throttled upload is not retried.
    pub async fn put_reader<S>(&self, container: &str, object: &str, chunks: S) -> Result<()>
    where
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
        Bytes: From<S::Ok>,
    {
        let result = async {
            let url = self.url(container, object)?;
            let options = RequestOptions::new().expect_status([StatusCode::CREATED]);
            self.client
                .stream_request(Method::PUT, &url, options, Some(Body::wrap_stream(chunks)))
                .await
        }
        .await;
        result
            .map(drop)
            .map_err(object_context(&Method::PUT, container, object))
    }

    /// Reads an object's metadata and standard headers.
    pub async fn head_object(&self, container: &str, object: &str) -> Result<HeaderMap> {
        let meta = self
            .touch_object(Method::HEAD, container, object, BinaryRequest::new())
            .await?;
        Ok(meta.headers)
    }

    /// Removes an object permanently.
    pub async fn delete_object(&self, container: &str, object: &str) -> Result<()> {
        let options = RequestOptions::new().expect_status([StatusCode::NO_CONTENT]);
        self.touch_object(
            Method::DELETE,
            container,
            object,
            BinaryRequest::with_options(options),
        )
        .await
        .map(drop)
    }

    /// Lists the contents of a container.
    pub async fn list(
        &self,
        container: &str,
        options: ListOptions,
    ) -> Result<Vec<ContainerContents>> {
        let result = async {
            let url = self.url(container, "")?;
            let mut contents: Vec<ContainerContents> = Vec::new();
            let options = RequestOptions::new().params(options.into_params());
            let request = JsonRequest::with_options(options).response(&mut contents);
            self.client.json_request(Method::GET, &url, request).await?;
            Ok::<_, crate::Error>(contents)
        }
        .await;
        result.map_err(|e| e.context(format!("failed to list contents of container: {container}")))
    }

    /// Returns the unsigned URL of an object, or of the container when `object` is empty.
    ///
    /// Only useful for publicly readable containers.
    pub fn url(&self, container: &str, object: &str) -> Result<String> {
        let path = if object.is_empty() {
            container.to_string()
        } else {
            format!("{container}/{object}")
        };
        self.client.service_url(super::OBJECT_STORE, &path)
    }

    async fn touch_object(
        &self,
        method: Method,
        container: &str,
        object: &str,
        request: BinaryRequest<'_>,
    ) -> Result<crate::ResponseMeta> {
        let result = async {
            let url = self.url(container, object)?;
            self.client.binary_request(method.clone(), &url, request).await
        }
        .await;
        result.map_err(object_context(&method, container, object))
    }
}

fn object_context<'a>(
    method: &'a Method,
    container: &'a str,
    object: &'a str,
) -> impl FnOnce(crate::Error) -> crate::Error + 'a {
    move |e| e.context(format!("failed to {method} object {object} from container {container}"))
}
