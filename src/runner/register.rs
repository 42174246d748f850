//! Cross-task registered-variable store (spec §9 "Global mutable state").
//! `tokio::sync::Mutex<HashMap<String, String>>`; last-writer-wins across
//! concurrently-completing hosts.

use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct Register {
    inner: Mutex<HashMap<String, String>>,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn merge(&self, vars: &HashMap<String, String>) {
        let mut guard = self.inner.lock().await;
        for (k, v) in vars {
            guard.insert(k.clone(), v.clone());
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_merges_are_last_writer_wins() {
        let register = Register::new();
        let mut a = HashMap::new();
        a.insert("x".to_string(), "1".to_string());
        let mut b = HashMap::new();
        b.insert("x".to_string(), "2".to_string());

        register.merge(&a).await;
        register.merge(&b).await;

        assert_eq!(register.snapshot().await.get("x"), Some(&"2".to_string()));
    }
}
