use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::IDS_PLACEHOLDER;

/// A contiguous `[start, end)` ID range covered by one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Batch {
    start: u64,
    end: u64,
}

impl Batch {
    pub fn new(start: u64, size: u32) -> Self {
        Self {
            start,
            end: start + size as u64,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn ids(&self) -> Range<u64> {
        self.start..self.end
    }

    /// IDs joined with `,`, ready for a query string.
    pub fn encode(&self) -> String {
        self.ids()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Resolve a URL template for this batch. `{ids}` is substituted when
    /// present, otherwise the encoded IDs are appended.
    pub fn url(&self, template: &str) -> String {
        let ids = self.encode();
        if template.contains(IDS_PLACEHOLDER) {
            template.replace(IDS_PLACEHOLDER, &ids)
        } else {
            format!("{template}{ids}")
        }
    }
}

/// Lay out `count` back-to-back batches of `size` IDs starting at 0.
pub fn plan_batches(size: u32, count: u32) -> Vec<Batch> {
    (0..count as u64)
        .map(|i| Batch::new(i * size as u64, size))
        .collect()
}
