use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    sql::Thing,
    Surreal,
};
use tokio_retry::{strategy::FixedInterval, Retry};
use tokio_util::sync::CancellationToken;

use common::model::{Community, Document, Entity, Relationship, TextChunk};

use crate::{
    ppr, AdapterError, BeamHit, Cancellable, ChunkHit, EntityScore, FetchedChunk, GraphStore,
    MentionHit, PprConfig, SeedScores, VectorHit,
};

/// SurrealDB-backed `GraphStore`. The one concrete implementation of the
/// adapter trait — schema DDL in `schema.rs` is assumed already applied by
/// the (out-of-scope) ingestion subsystem.
#[derive(Clone)]
pub struct SurrealGraphStore {
    db: Surreal<Any>,
}

impl SurrealGraphStore {
    pub async fn connect(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> surrealdb::Result<Self> {
        let db = connect(address).await?;
        db.signin(Root { username, password }).await?;
        db.use_ns(namespace).use_db(database).await?;
        Ok(Self { db })
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub async fn memory(namespace: &str, database: &str) -> surrealdb::Result<Self> {
        let db = connect("mem://").await?;
        db.use_ns(namespace).use_db(database).await?;
        Ok(Self { db })
    }

    pub fn inner(&self) -> &Surreal<Any> {
        &self.db
    }
}

/// Retries a transient-failure-prone operation exactly once with a fixed
/// 50 ms delay (§5). `Fatal` errors are never retried.
async fn retry_once<T, F, Fut>(op: F) -> Result<T, AdapterError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AdapterError>>,
{
    let strategy = FixedInterval::from_millis(50).take(1);
    Retry::spawn(strategy, || async {
        match op().await {
            Ok(v) => Ok(v),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => Err(e),
        }
    })
    .await
}

fn to_fatal(err: surrealdb::Error) -> AdapterError {
    AdapterError::Fatal(err.to_string())
}

#[derive(Debug, Deserialize)]
struct VectorScoreRow {
    id: Thing,
    chunk_id: Option<String>,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct FtsScoreRow {
    chunk_id: String,
    score: f32,
}

#[async_trait]
impl GraphStore for SurrealGraphStore {
    async fn fetch_chunks(
        &self,
        chunk_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query("SELECT * FROM text_chunk WHERE chunk_id IN $ids")
                .bind(("ids", chunk_ids.to_vec()))
                .await
                .map_err(to_fatal)?;
            let found: Vec<TextChunk> = resp.take(0).map_err(to_fatal)?;
            Ok(found)
        })
        .await?;

        let by_id: std::collections::HashMap<_, _> =
            result.into_iter().map(|c| (c.chunk_id.clone(), c)).collect();
        let ordered = chunk_ids
            .iter()
            .map(|id| FetchedChunk {
                chunk_id: id.clone(),
                chunk: by_id.get(id).cloned(),
            })
            .collect();
        Ok(Cancellable::Ready(ordered))
    }

    async fn vector_search_sentences(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<VectorHit>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let embedding = embedding.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT id, chunk_id, vector::similarity::cosine(embedding, $q) AS score
                     FROM sentence
                     WHERE embedding <|$k,40|> $q
                     ORDER BY score DESC, id
                     LIMIT $k",
                )
                .bind(("q", embedding.clone()))
                .bind(("k", k as i64))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<VectorScoreRow> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;

        let mut hits: Vec<VectorHit> = result
            .into_iter()
            .filter(|r| r.score >= min_score)
            .map(|r| VectorHit {
                id: r.id.id.to_raw(),
                chunk_id: r.chunk_id.unwrap_or_default(),
                score: r.score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(Cancellable::Ready(hits))
    }

    async fn vector_search_chunks(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let embedding = embedding.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT chunk_id, vector::similarity::cosine(embedding, $q) AS score
                     FROM text_chunk
                     WHERE embedding <|$k,40|> $q
                     ORDER BY score DESC, chunk_id
                     LIMIT $k",
                )
                .bind(("q", embedding.clone()))
                .bind(("k", k as i64))
                .await
                .map_err(to_fatal)?;
            #[derive(Debug, Deserialize)]
            struct Row {
                chunk_id: String,
                score: f32,
            }
            let rows: Vec<Row> = resp.take(0).map_err(to_fatal)?;
            Ok(rows
                .into_iter()
                .map(|r| ChunkHit {
                    chunk_id: r.chunk_id,
                    score: r.score,
                })
                .collect::<Vec<_>>())
        })
        .await?;

        let mut hits: Vec<ChunkHit> = result.into_iter().filter(|r| r.score >= min_score).collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(Cancellable::Ready(hits))
    }

    async fn bm25_search_chunks(
        &self,
        query_text: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let query_text = query_text.to_string();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT chunk_id, search::score(0) AS score
                     FROM text_chunk
                     WHERE text @0@ $terms
                     ORDER BY score DESC, chunk_id
                     LIMIT $k",
                )
                .bind(("terms", query_text.clone()))
                .bind(("k", k as i64))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<FtsScoreRow> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;

        let hits = result
            .into_iter()
            .map(|r| ChunkHit {
                chunk_id: r.chunk_id,
                score: r.score,
            })
            .collect();
        Ok(Cancellable::Ready(hits))
    }

    async fn mentions_to_chunks(
        &self,
        entity_names: &[String],
        limit_per_entity: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<MentionHit>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let mut out = Vec::new();
        for name in entity_names {
            let name = name.clone();
            let rows: Vec<MentionHit> = retry_once(|| async {
                let mut resp = self
                    .db
                    .query(
                        "SELECT chunk_id FROM text_chunk WHERE $name IN mentions
                         LIMIT $limit",
                    )
                    .bind(("name", name.clone()))
                    .bind(("limit", limit_per_entity as i64))
                    .await
                    .map_err(to_fatal)?;
                #[derive(Debug, Deserialize)]
                struct Row {
                    chunk_id: String,
                }
                let rows: Vec<Row> = resp.take(0).map_err(to_fatal)?;
                Ok(rows
                    .into_iter()
                    .map(|r| MentionHit {
                        entity_name: name.clone(),
                        chunk_id: r.chunk_id,
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
            out.extend(rows);
        }
        Ok(Cancellable::Ready(out))
    }

    async fn expand_relationships(
        &self,
        entity_ids: &[String],
        max_edges: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Relationship>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let things: Vec<Thing> = entity_ids
            .iter()
            .map(|id| Thing::from(("entity", id.as_str())))
            .collect();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT in, out, predicate, weight FROM relates_to
                     WHERE in IN $ids OR out IN $ids
                     ORDER BY weight DESC
                     LIMIT $limit",
                )
                .bind(("ids", things.clone()))
                .bind(("limit", max_edges as i64))
                .await
                .map_err(to_fatal)?;
            #[derive(Debug, Deserialize)]
            struct Row {
                #[serde(rename = "in")]
                src: Thing,
                #[serde(rename = "out")]
                dst: Thing,
                predicate: String,
                weight: f32,
            }
            let rows: Vec<Row> = resp.take(0).map_err(to_fatal)?;
            Ok(rows
                .into_iter()
                .map(|r| Relationship {
                    src: r.src.id.to_raw(),
                    dst: r.dst.id.to_raw(),
                    predicate: r.predicate,
                    weight: r.weight,
                })
                .collect::<Vec<_>>())
        })
        .await?;

        let mut rels = result;
        rels.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.src.as_str(), a.dst.as_str()).cmp(&(b.src.as_str(), b.dst.as_str())))
        });
        rels.truncate(max_edges);
        Ok(Cancellable::Ready(rels))
    }

    async fn ppr_traverse(
        &self,
        seed_scores: &SeedScores,
        config: &PprConfig,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<EntityScore>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let scores = ppr::traverse(&self.db, seed_scores, config)
            .await
            .map_err(to_fatal)?;
        Ok(Cancellable::Ready(scores))
    }

    async fn beam_expand(
        &self,
        seed_entity_ids: &[String],
        query_embedding: &[f32],
        hops: usize,
        beam_width: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<BeamHit>>, AdapterError> {
        let mut frontier: Vec<BeamHit> = seed_entity_ids
            .iter()
            .map(|id| BeamHit {
                entity_id: id.clone(),
                path: vec![id.clone()],
            })
            .collect();
        let mut visited: std::collections::HashSet<String> =
            seed_entity_ids.iter().cloned().collect();

        for _ in 0..hops {
            if cancel.is_cancelled() {
                return Ok(Cancellable::Cancelled);
            }
            let frontier_ids: Vec<String> = frontier.iter().map(|h| h.entity_id.clone()).collect();
            if frontier_ids.is_empty() {
                break;
            }
            let things: Vec<Thing> = frontier_ids
                .iter()
                .map(|id| Thing::from(("entity", id.as_str())))
                .collect();
            let embedding = query_embedding.to_vec();
            let result = retry_once(|| async {
                let mut resp = self
                    .db
                    .query(
                        "SELECT in.entity_id AS source_id, out.entity_id AS entity_id,
                                out.embedding AS embedding,
                                vector::similarity::cosine(out.embedding, $q) AS score
                         FROM relates_to
                         WHERE in IN $frontier",
                    )
                    .bind(("frontier", things.clone()))
                    .bind(("q", embedding.clone()))
                    .await
                    .map_err(to_fatal)?;
                #[derive(Debug, Deserialize)]
                struct Row {
                    source_id: String,
                    entity_id: String,
                    score: f32,
                }
                let rows: Vec<Row> = resp.take(0).map_err(to_fatal)?;
                Ok(rows)
            })
            .await?;

            let mut candidates: Vec<(String, String, f32)> = result
                .into_iter()
                .filter(|r| !visited.contains(&r.entity_id))
                .map(|r| (r.source_id, r.entity_id, r.score))
                .collect();
            candidates.sort_by(|a, b| {
                b.2.partial_cmp(&a.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.1.cmp(&b.1))
            });
            candidates.truncate(beam_width);

            let mut next_frontier = Vec::new();
            for (source_id, entity_id, _) in candidates {
                visited.insert(entity_id.clone());
                let parent_path = frontier
                    .iter()
                    .find(|h| h.entity_id == source_id)
                    .map(|h| h.path.clone())
                    .unwrap_or_default();
                let mut path = parent_path;
                path.push(entity_id.clone());
                next_frontier.push(BeamHit { entity_id, path });
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(Cancellable::Ready(frontier))
    }

    async fn fetch_communities(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Community>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query("SELECT * FROM community")
                .await
                .map_err(to_fatal)?;
            let rows: Vec<Community> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn fetch_entity_descriptions(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<(String, String)>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let ids = entity_ids.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query("SELECT entity_id, description FROM entity WHERE entity_id IN $ids")
                .bind(("ids", ids.clone()))
                .await
                .map_err(to_fatal)?;
            #[derive(Debug, Deserialize)]
            struct Row {
                entity_id: String,
                description: String,
            }
            let rows: Vec<Row> = resp.take(0).map_err(to_fatal)?;
            Ok(rows
                .into_iter()
                .map(|r| (r.entity_id, r.description))
                .collect::<Vec<_>>())
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn vector_search_entities(
        &self,
        embedding: &[f32],
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let embedding = embedding.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT * FROM entity
                     WHERE embedding <|$k,40|> $q",
                )
                .bind(("q", embedding.clone()))
                .bind(("k", k as i64))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<Entity> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn find_entities_by_name(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let names = names.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query("SELECT * FROM entity WHERE name IN $names")
                .bind(("names", names.clone()))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<Entity> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn fetch_entities_by_id(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let ids = entity_ids.to_vec();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query("SELECT * FROM entity WHERE entity_id IN $ids")
                .bind(("ids", ids.clone()))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<Entity> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn list_documents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Document>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let result = retry_once(|| async {
            let mut resp = self.db.query("SELECT * FROM document").await.map_err(to_fatal)?;
            let rows: Vec<Document> = resp.take(0).map_err(to_fatal)?;
            Ok(rows)
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }

    async fn fetch_lead_chunk(
        &self,
        doc_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Option<TextChunk>>, AdapterError> {
        if cancel.is_cancelled() {
            return Ok(Cancellable::Cancelled);
        }
        let doc_id = doc_id.to_string();
        let result = retry_once(|| async {
            let mut resp = self
                .db
                .query(
                    "SELECT * FROM text_chunk
                     WHERE doc_id = $doc_id AND prev_chunk_id IS NONE
                     LIMIT 1",
                )
                .bind(("doc_id", doc_id.clone()))
                .await
                .map_err(to_fatal)?;
            let rows: Vec<TextChunk> = resp.take(0).map_err(to_fatal)?;
            Ok(rows.into_iter().next())
        })
        .await?;
        Ok(Cancellable::Ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::TextChunk;
    use uuid::Uuid;

    async fn setup() -> SurrealGraphStore {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        let store = SurrealGraphStore::memory(namespace, &database)
            .await
            .expect("failed to start in-memory surrealdb");
        crate::schema::ensure_indexes(store.inner(), 3)
            .await
            .expect("failed to build indexes");
        store
    }

    #[tokio::test]
    async fn fetch_chunks_preserves_request_order_and_flags_missing() {
        let store = setup().await;
        let chunk = TextChunk {
            chunk_id: "c1".into(),
            doc_id: "d1".into(),
            section_id: "s1".into(),
            text: "Tokio uses cooperative scheduling.".into(),
            page: None,
            token_count: 5,
            embedding: vec![0.1, 0.2, 0.3],
            prev_chunk_id: None,
            next_chunk_id: None,
            mentions: vec![],
        };
        let _: Option<TextChunk> = store
            .inner()
            .create(("text_chunk", "c1"))
            .content(chunk)
            .await
            .expect("failed to store chunk");

        let cancel = CancellationToken::new();
        let result = store
            .fetch_chunks(&["c1".to_string(), "missing".to_string()], &cancel)
            .await
            .expect("fetch_chunks failed");
        let fetched = result.into_ready().expect("not cancelled");
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].chunk_id, "c1");
        assert!(fetched[0].chunk.is_some());
        assert_eq!(fetched[1].chunk_id, "missing");
        assert!(fetched[1].chunk.is_none());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_query() {
        let store = setup().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = store
            .fetch_chunks(&["c1".to_string()], &cancel)
            .await
            .expect("fetch_chunks failed");
        assert!(matches!(result, Cancellable::Cancelled));
    }
}
