use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub src: String,
    pub dst: String,
    pub predicate: String,
    pub weight: f32,
}

impl Relationship {
    /// `0 ≤ weight ≤ 1`; self-loops forbidden.
    pub fn validate(&self) -> Result<(), String> {
        if self.src == self.dst {
            return Err(format!("self-loop relationship on {}", self.src));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(format!(
                "relationship {}->{} weight {} out of [0, 1]",
                self.src, self.dst, self.weight
            ));
        }
        Ok(())
    }
}
