use std::time::{Duration, Instant};

use criterion::Criterion;
use tokio::runtime::Runtime;
use yao_gc::{
    bits::BitVector,
    channel::SimpleChannel,
    circuit::Circuit,
    protocol::{Role, run_2pc},
};

pub fn twopc_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    bench_and_chain(c, &rt);
}

/// Benchmark the evaluation of a long chain of ANDs.
fn bench_and_chain(c: &mut Criterion, rt: &Runtime) {
    let and_length = 10_000;

    let mut g = c.benchmark_group("2pc");
    g.throughput(criterion::Throughput::Elements(and_length as u64));
    let bench_id = format!("{and_length} chained ANDs");

    g.bench_function(&bench_id, |b| {
        b.to_async(rt).iter_custom(|iters| {
            let circ = and_chain(and_length);
            let input = BitVector::from_bools(vec![true]);

            async move {
                let mut elapsed = Duration::default();
                for _ in 0..iters {
                    let (ch1, ch2) = SimpleChannel::pair();
                    let (circ1, circ2) = (circ.clone(), circ.clone());
                    let (in1, in2) = (input.clone(), input.clone());

                    let now = Instant::now();
                    // Spawned so that both parties actually run on separate threads.
                    let jh1 = tokio::spawn(async move {
                        run_2pc(ch1, &circ1, Role::Garbler, &in1, &mut ()).await
                    });
                    let jh2 = tokio::spawn(async move {
                        run_2pc(ch2, &circ2, Role::Evaluator, &in2, &mut ()).await
                    });
                    match tokio::try_join!(jh1, jh2).expect("join failed") {
                        (_, Err(err)) | (Err(err), _) => {
                            panic!("and_chain eval failed with {err:?}")
                        }
                        (Ok(res1), Ok(res2)) => {
                            // Output should be true because we chain a bunch of ANDs with initial inputs that are true
                            assert!(res1.all());
                            assert!(res2.all());
                        }
                    };
                    elapsed += now.elapsed();
                }
                elapsed
            }
        })
    });
}

/// Creates a chain of and gates where each gate is the and of the previous two.
/// One input per party.
fn and_chain(gates: usize) -> Circuit {
    let out_idx = gates + 1;
    let mut text = format!("{gates} {}\n2 1 1\n1 1\n", out_idx + 1);
    for i in 2..=out_idx {
        text.push_str(&format!("2 1 {} {} {i} AND\n", i - 2, i - 1));
    }
    Circuit::parse_bristol(&text).expect("and chain is a valid circuit")
}
