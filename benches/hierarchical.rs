use std::hint::black_box;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use ndarray::Array2;
use portfolio_opt::cluster;
use portfolio_opt::cluster::ClusterConfig;
use portfolio_opt::cluster::Linkage;
use portfolio_opt::moments::MomentConfig;
use portfolio_opt::moments::MomentEstimates;
use portfolio_opt::optimizers;
use portfolio_opt::optimizers::HierarchicalConfig;
use portfolio_opt::optimizers::HierarchicalModel;
use portfolio_opt::ReturnMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

/// Assets loading on one of four sector factors.
fn sector_returns(t: usize, n: usize) -> ReturnMatrix {
  let mut rng = StdRng::seed_from_u64(11);
  let noise = Normal::new(0.0, 0.01).unwrap();
  let factors = Array2::from_shape_fn((t, 4), |_| noise.sample(&mut rng));
  let values = Array2::from_shape_fn((t, n), |(i, j)| factors[[i, j % 4]] + 0.5 * noise.sample(&mut rng));
  let symbols: Vec<String> = (0..n).map(|j| format!("S{j}")).collect();
  ReturnMatrix::from_array(&symbols, values).unwrap()
}

fn bench_clustering(c: &mut Criterion) {
  let mut group = c.benchmark_group("clustering");
  for linkage in [Linkage::Single, Linkage::Ward, Linkage::Dbht] {
    let returns = sector_returns(504, 40);
    let config = ClusterConfig {
      linkage,
      ..Default::default()
    };
    group.bench_with_input(BenchmarkId::new("linkage", format!("{linkage:?}")), &config, |b, config| {
      b.iter(|| black_box(cluster::cluster_assets(returns.values(), config)));
    });
  }
  group.finish();
}

fn bench_models(c: &mut Criterion) {
  let mut group = c.benchmark_group("hierarchical");
  group.sample_size(20);
  let returns = sector_returns(504, 24);
  let moments = MomentEstimates::estimate(returns.values(), &MomentConfig::default()).unwrap();
  for model in [HierarchicalModel::Hrp, HierarchicalModel::Herc, HierarchicalModel::Nco] {
    let config = HierarchicalConfig {
      model,
      ..Default::default()
    };
    group.bench_with_input(BenchmarkId::new("model", model), &config, |b, config| {
      b.iter(|| black_box(optimizers::hierarchical(&returns, &moments, config)));
    });
  }
  group.finish();
}

criterion_group!(benches, bench_clustering, bench_models);
criterion_main!(benches);
