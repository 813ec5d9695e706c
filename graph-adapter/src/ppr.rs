use std::collections::HashMap;

use serde::Deserialize;
use surrealdb::{engine::any::Any, sql::Thing, Surreal};

use crate::{EntityScore, PprConfig, SeedScores};

#[derive(Debug, Deserialize)]
struct EdgeRow {
    #[serde(rename = "in")]
    src: Thing,
    #[serde(rename = "out")]
    dst: Thing,
    weight: f32,
}

#[derive(Debug, Deserialize)]
struct SectionRow {
    entity_id: String,
    section_id: String,
}

#[derive(Debug, Deserialize)]
struct MentionCountRow {
    entity_id: String,
    section_id: String,
    mention_count: i64,
}

fn accumulate(scores: &mut HashMap<String, f32>, entity_id: &str, contribution: f32) {
    *scores.entry(entity_id.to_string()).or_insert(0.0) += contribution;
}

/// Executes the five-path personalized PageRank walk (§4.4.4). Each path is
/// its own query against the graph store; contributions are summed into one
/// combined score per entity, deterministic for fixed seeds and config.
pub async fn traverse(
    db: &Surreal<Any>,
    seed_scores: &SeedScores,
    config: &PprConfig,
) -> surrealdb::Result<Vec<EntityScore>> {
    let mut combined: HashMap<String, f32> = HashMap::new();
    let seed_ids: Vec<String> = seed_scores.keys().cloned().collect();
    if seed_ids.is_empty() {
        return Ok(Vec::new());
    }

    // Path 1: direct graph edges from seeds, weighted by relationship weight
    // and damped.
    let mut resp = db
        .query(
            "SELECT in, out, weight FROM relates_to
             WHERE in IN $seeds OR out IN $seeds
             ORDER BY weight DESC, in, out
             LIMIT $limit",
        )
        .bind((
            "seeds",
            seed_ids
                .iter()
                .map(|id| Thing::from(("entity", id.as_str())))
                .collect::<Vec<_>>(),
        ))
        .bind(("limit", config.max_neighbors_per_seed as i64))
        .await?;
    let edges: Vec<EdgeRow> = resp.take(0)?;
    for edge in &edges {
        let src_id = edge.src.id.to_raw();
        let dst_id = edge.dst.id.to_raw();
        let (seed_id, neighbor_id) = if seed_scores.contains_key(&src_id) {
            (src_id, dst_id)
        } else {
            (dst_id, src_id)
        };
        if let Some(seed_weight) = seed_scores.get(&seed_id) {
            accumulate(
                &mut combined,
                &neighbor_id,
                seed_weight * edge.weight * config.damping,
            );
        }
    }

    // Path 2: mentions -> chunks -> cross-section similarity -> chunks ->
    // entities. Follows topical similarity between sections containing
    // seeds and sections mentioning other entities.
    let mut resp = db
        .query(
            "SELECT entity_id, section_id FROM mentions
             WHERE entity_id IN $seeds",
        )
        .bind(("seeds", seed_ids.clone()))
        .await?;
    let seed_sections: Vec<SectionRow> = resp.take(0)?;
    let section_ids: Vec<String> = seed_sections.iter().map(|r| r.section_id.clone()).collect();
    if !section_ids.is_empty() {
        let mut resp = db
            .query(
                "SELECT entity_id, section_id FROM mentions
                 WHERE section_id IN $sections AND entity_id NOT IN $seeds",
            )
            .bind(("sections", section_ids))
            .bind(("seeds", seed_ids.clone()))
            .await?;
        let cross_section: Vec<SectionRow> = resp.take(0)?;
        for row in &cross_section {
            let seed_weight = seed_scores.values().copied().fold(0.0_f32, f32::max);
            accumulate(
                &mut combined,
                &row.entity_id,
                seed_weight * config.damping * 0.5,
            );
        }
    }

    // Path 3: SEMANTICALLY_SIMILAR_TO edges, weighted by sim_weight.
    let mut resp = db
        .query(
            "SELECT in, out, weight FROM semantically_similar_to
             WHERE in IN $seeds OR out IN $seeds
             LIMIT $limit",
        )
        .bind((
            "seeds",
            seed_ids
                .iter()
                .map(|id| Thing::from(("entity", id.as_str())))
                .collect::<Vec<_>>(),
        ))
        .bind(("limit", config.max_neighbors_per_seed as i64))
        .await?;
    let sim_edges: Vec<EdgeRow> = resp.take(0)?;
    for edge in &sim_edges {
        let src_id = edge.src.id.to_raw();
        let dst_id = edge.dst.id.to_raw();
        let (seed_id, neighbor_id) = if seed_scores.contains_key(&src_id) {
            (src_id, dst_id)
        } else {
            (dst_id, src_id)
        };
        if let Some(seed_weight) = seed_scores.get(&seed_id) {
            accumulate(
                &mut combined,
                &neighbor_id,
                seed_weight * edge.weight * config.sim_weight,
            );
        }
    }

    // Path 4: section co-membership -> hub entities sharing sections with
    // seeds.
    if !seed_sections.is_empty() {
        let section_ids: Vec<String> = seed_sections.iter().map(|r| r.section_id.clone()).collect();
        let mut resp = db
            .query(
                "SELECT entity_id, section_id FROM mentions
                 WHERE section_id IN $sections AND entity_id NOT IN $seeds",
            )
            .bind(("sections", section_ids))
            .bind(("seeds", seed_ids.clone()))
            .await?;
        let hub_rows: Vec<SectionRow> = resp.take(0)?;
        let seed_weight = seed_scores.values().copied().fold(0.0_f32, f32::max);
        for row in &hub_rows {
            accumulate(&mut combined, &row.entity_id, seed_weight * config.hub_weight);
        }
    }

    // Path 5: high-mention-count entities from the same sections as seeds.
    if !seed_sections.is_empty() {
        let section_ids: Vec<String> = seed_sections.iter().map(|r| r.section_id.clone()).collect();
        let mut resp = db
            .query(
                "SELECT entity_id, section_id, count() AS mention_count FROM mentions
                 WHERE section_id IN $sections AND entity_id NOT IN $seeds
                 GROUP BY entity_id, section_id
                 ORDER BY mention_count DESC
                 LIMIT $limit",
            )
            .bind(("sections", section_ids))
            .bind(("seeds", seed_ids.clone()))
            .bind(("limit", config.max_neighbors_per_seed as i64))
            .await?;
        let hub_counts: Vec<MentionCountRow> = resp.take(0)?;
        let seed_weight = seed_scores.values().copied().fold(0.0_f32, f32::max);
        for row in &hub_counts {
            let normalized = (row.mention_count as f32).min(10.0) / 10.0;
            accumulate(
                &mut combined,
                &row.entity_id,
                seed_weight * config.hub_weight * normalized,
            );
        }
    }

    let mut out: Vec<EntityScore> = combined
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .map(|(entity_id, score)| EntityScore { entity_id, score })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    Ok(out)
}
