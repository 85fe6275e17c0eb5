use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    clock::Clock,
    dao::store::{BoardStore, SnapshotEnvelope, SnapshotStream, StorageResult},
    ident::GameId,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{ChangesResponse, CouchBoardDocument, CouchNameDocument, board_doc_id, name_doc_id},
};

/// How long the server may hold a longpoll request open before responding.
const LONGPOLL_TIMEOUT_MS: u64 = 55_000;
/// Pause before retrying a failed `_changes` poll.
const CHANGES_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    update_seq: Value,
}

/// CouchDB-backed board store.
#[derive(Clone)]
pub struct CouchBoardStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    clock: Arc<dyn Clock>,
}

impl CouchBoardStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig, clock: Arc<dyn Clock>) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            clock,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn database_info(&self) -> CouchResult<DatabaseInfo> {
        const INFO_PATH: &str = "";
        let response = self.request(Method::GET, INFO_PATH).send().await.map_err(
            |source| CouchDaoError::RequestSend {
                path: self.database.to_string(),
                source,
            },
        )?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: self.database.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<DatabaseInfo>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: self.database.to_string(),
                source,
            })
    }

    /// One longpoll round against `_changes`, filtered to the board document.
    async fn poll_changes(&self, doc_id: &str, since: &Value) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let query = [
            ("feed", "longpoll".to_string()),
            ("include_docs", "true".to_string()),
            ("filter", "_doc_ids".to_string()),
            ("timeout", LONGPOLL_TIMEOUT_MS.to_string()),
            ("since", since_param(since)),
        ];

        let response = self
            .request(Method::POST, CHANGES)
            .query(&query)
            .json(&json!({ "doc_ids": [doc_id] }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }
}

/// Sequence tokens are strings on CouchDB 2+ and integers on 1.x.
fn since_param(since: &Value) -> String {
    match since {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl BoardStore for CouchBoardStore {
    fn write_state(
        &self,
        game: GameId,
        mut doc: crate::dao::models::GameStateDoc,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            doc.last_update = Some(store.clock.now_ms());
            let doc_id = board_doc_id(&game);
            let mut couch_doc = CouchBoardDocument::new(&game, doc);
            if let Some(existing) = store.get_document::<CouchBoardDocument>(&doc_id).await? {
                couch_doc.rev = existing.rev;
            }
            store
                .put_document(&doc_id, &couch_doc)
                .await
                .map_err(Into::into)
        })
    }

    fn load_state(
        &self,
        game: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<crate::dao::models::GameStateDoc>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = board_doc_id(&game);
            let maybe_doc = store.get_document::<CouchBoardDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.state))
        })
    }

    fn subscribe(&self, game: GameId) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = board_doc_id(&game);

            // Capture the sequence before the initial read so a write landing
            // in between is re-delivered by the feed instead of lost.
            // Applying a snapshot twice is harmless.
            let mut since = store.database_info().await?.update_seq;
            let initial = store.get_document::<CouchBoardDocument>(&doc_id).await?;

            let stream = async_stream::stream! {
                yield match initial {
                    Some(doc) => SnapshotEnvelope { exists: true, doc: Some(doc.state) },
                    None => SnapshotEnvelope { exists: false, doc: None },
                };

                loop {
                    let page = match store.poll_changes(&doc_id, &since).await {
                        Ok(page) => page,
                        Err(error) => {
                            warn!(%error, doc_id, "changes poll failed, retrying");
                            tokio::time::sleep(CHANGES_RETRY_DELAY).await;
                            continue;
                        }
                    };
                    since = page.last_seq;

                    for row in page.results {
                        if row.deleted {
                            yield SnapshotEnvelope { exists: false, doc: None };
                            continue;
                        }
                        let Some(raw) = row.doc else { continue };
                        match serde_json::from_value::<CouchBoardDocument>(raw) {
                            Ok(doc) => yield SnapshotEnvelope {
                                exists: true,
                                doc: Some(doc.state),
                            },
                            Err(error) => {
                                warn!(%error, doc_id, "skipping undecodable change");
                            }
                        }
                    }
                };
                #[allow(unreachable_code)]
                ()
            };

            Ok(Box::pin(stream) as SnapshotStream)
        })
    }

    fn read_name(&self, game: GameId) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = name_doc_id(&game);
            let maybe_doc = store.get_document::<CouchNameDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.name))
        })
    }

    fn write_name(&self, game: GameId, name: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = name_doc_id(&game);
            let mut doc = CouchNameDocument {
                id: doc_id.clone(),
                rev: None,
                name,
            };
            if let Some(existing) = store.get_document::<CouchNameDocument>(&doc_id).await? {
                doc.rev = existing.rev;
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.database_info().await.map(|_| ()).map_err(Into::into) })
    }
}
