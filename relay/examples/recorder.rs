// Records strings on two of three workers and prints what each one saw.

use relay::logging;
use relay::{PoolConfig, Worker, WorkerPool};

#[derive(Debug, Default)]
struct Recorder {
    records: Vec<String>,
}

impl Recorder {
    fn record(&mut self, text: String) {
        logging::info!(%text, "recording");
        self.records.push(text);
    }
}

impl Worker for Recorder {
    fn started(&mut self, index: usize) {
        logging::debug!(index, "recorder ready");
    }
}

fn main() -> anyhow::Result<()> {
    logging::init_development();

    let pool = WorkerPool::new(PoolConfig::with_workers(3), |_| Recorder::default())?;
    pool.start()?;

    pool.try_invoke(1, Recorder::record, ("abc".to_string(),))?;
    pool.try_invoke(2, Recorder::record, ("def".to_string(),))?;

    for (index, recorder) in pool.shutdown()?.into_iter().enumerate() {
        println!("worker {index}: {:?}", recorder.records);
    }
    Ok(())
}
