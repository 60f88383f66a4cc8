use anyhow::{bail, Result};

use tutor_core::traits::{AnnIndex, AnnResult};

/// Exact nearest-neighbour search by inner product. Rows are expected to be
/// L2-normalized, which makes the score a cosine similarity.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self { Self { dim, data: Vec::new() } }

    pub fn from_rows(dim: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim);
        index.add(rows)?;
        Ok(index)
    }

    pub fn add(&mut self, rows: &[Vec<f32>]) -> Result<()> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != self.dim {
                bail!("row {} has dimension {}, index expects {}", i, row.len(), self.dim);
            }
        }
        self.data.reserve(rows.len() * self.dim);
        for row in rows { self.data.extend_from_slice(row); }
        Ok(())
    }

    fn row(&self, i: usize) -> &[f32] { &self.data[i * self.dim..(i + 1) * self.dim] }
}

impl AnnIndex for FlatIpIndex {
    fn dim(&self) -> usize { self.dim }

    fn len(&self) -> usize { if self.dim == 0 { 0 } else { self.data.len() / self.dim } }

    /// Always returns exactly `k` slots per query; missing slots are `-1`.
    fn search(&self, queries: &[Vec<f32>], k: usize) -> Result<AnnResult> {
        let mut out = AnnResult::default();
        for q in queries {
            if q.len() != self.dim {
                bail!("query has dimension {}, index expects {}", q.len(), self.dim);
            }
            let mut scored: Vec<(usize, f32)> = (0..self.len())
                .map(|i| (i, self.row(i).iter().zip(q).map(|(a, b)| a * b).sum()))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);

            let mut scores = Vec::with_capacity(k);
            let mut ids = Vec::with_capacity(k);
            for (i, s) in scored {
                scores.push(s);
                ids.push(i as i64);
            }
            while ids.len() < k {
                scores.push(f32::MIN);
                ids.push(-1);
            }
            out.scores.push(scores);
            out.ids.push(ids);
        }
        Ok(out)
    }
}
