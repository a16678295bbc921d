//! Simulated GPU inference behind a dynamic batcher
//!
//! A fake model charges a fixed cost per forward pass plus a small cost per
//! input, which is the shape that makes batching pay off. Many concurrent
//! "requests" each submit one prompt and await their own logits.
//!
//! Usage:
//!   RUST_LOG=dynbatch_core=debug cargo run --example inference_batching

use async_trait::async_trait;
use dynbatch_core::{BatchProcessor, Batcher, BatcherConfig, BatcherResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pretend model: 20ms per forward pass + 1ms per prompt
struct ToyModel {
    pass_cost: Duration,
    item_cost: Duration,
}

#[async_trait]
impl BatchProcessor for ToyModel {
    type Input = String;
    type Output = Vec<f32>;

    async fn process(&self, prompts: Vec<String>) -> BatcherResult<Vec<Vec<f32>>> {
        let cost = self.pass_cost + self.item_cost * prompts.len() as u32;
        tokio::time::sleep(cost).await;

        Ok(prompts
            .iter()
            .map(|p| {
                let score = p.bytes().map(f32::from).sum::<f32>() / 255.0;
                vec![score, p.len() as f32]
            })
            .collect())
    }
}

#[tokio::main]
async fn main() -> BatcherResult<()> {
    let config = BatcherConfig::new(16, Duration::from_millis(15))
        .with_name("toy-model")
        .with_max_concurrent_batches(2);

    let model = ToyModel {
        pass_cost: Duration::from_millis(20),
        item_cost: Duration::from_millis(1),
    };
    let batcher = Arc::new(Batcher::new(config, model)?);

    let started = Instant::now();
    let mut requests = Vec::new();
    for i in 0..64u64 {
        let batcher = Arc::clone(&batcher);
        requests.push(tokio::spawn(async move {
            // Spread arrivals over ~60ms
            tokio::time::sleep(Duration::from_millis(i % 60)).await;
            batcher
                .call_timeout(format!("prompt number {}", i), Duration::from_secs(1))
                .await
        }));
    }

    let mut ok = 0;
    for request in requests {
        match request.await {
            Ok(Ok(_logits)) => ok += 1,
            Ok(Err(e)) => eprintln!("request failed: {}", e),
            Err(e) => eprintln!("request task failed: {}", e),
        }
    }

    batcher.shutdown().await?;

    let stats = batcher.stats();
    println!("{} / 64 requests served in {:?}", ok, started.elapsed());
    println!(
        "{} batches, {:.1} items per batch",
        stats.batches_formed,
        stats.submitted as f64 / stats.batches_formed.max(1) as f64
    );
    Ok(())
}
