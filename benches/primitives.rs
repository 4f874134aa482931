use std::time::Instant;

use criterion::{BenchmarkGroup, BenchmarkId, Criterion, measurement::WallTime};
use rand::{SeedableRng, random};
use rand_chacha::ChaCha20Rng;
use tokio::runtime::Runtime;
use yao_gc::{
    Label,
    channel::{MsgChannel, SimpleChannel},
    ot::{receive_oblivious, send_oblivious},
};

pub fn primitives_benchmark(c: &mut Criterion) {
    // Default runtime for "full" feature is multi-threaded
    let rt = Runtime::new().unwrap();

    let ot_count_exponents = [6, 8, 10];
    let mut g = c.benchmark_group("primitives");
    for exp in ot_count_exponents {
        let ot_count = 2_usize.pow(exp);
        let bench_id = BenchmarkId::new("DH OTs", ot_count);
        g.throughput(criterion::Throughput::Elements(ot_count as u64));
        bench_ots(&mut g, &rt, bench_id, ot_count);
    }
}

fn bench_ots(g: &mut BenchmarkGroup<'_, WallTime>, rt: &Runtime, bench_id: BenchmarkId, count: usize) {
    g.bench_function(bench_id, |b| {
        b.to_async(rt).iter_custom(|iters| {
            // iter_custom allows us to do the setup here without impacting the tracked time
            let (ch1, ch2) = SimpleChannel::pair();
            let (mut ch1, mut ch2) = (MsgChannel::new(ch1), MsgChannel::new(ch2));
            let mut rng1 = ChaCha20Rng::seed_from_u64(42);
            let mut rng2 = ChaCha20Rng::seed_from_u64(43);
            let label = || Label::from_bytes(&random::<[u8; 16]>()).expect("16 bytes");
            let messages: Vec<_> = (0..count).map(|_| (label(), label())).collect();
            let choices: Vec<bool> = (0..count).map(|_| random()).collect();

            async move {
                let start = Instant::now();
                for _ in 0..iters {
                    let (sent, received) = tokio::join!(
                        send_oblivious(&mut ch1, "bench", &messages, &mut rng1),
                        receive_oblivious(&mut ch2, "bench", &choices, &mut rng2),
                    );
                    sent.unwrap();
                    received.unwrap();
                }
                start.elapsed()
            }
        })
    });
}
