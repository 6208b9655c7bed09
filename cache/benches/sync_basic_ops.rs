use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_resolver::{
  BoundedCache, EnvironmentProfile, LinkQuality, ResourceDescriptor, ResourceLocatorCache,
  ResourceSelector, TargetClass,
};
use std::collections::HashSet;
use std::time::Duration;

const CAPACITIES: &[usize] = &[100, 1_000, 10_000];

fn build_cache(capacity: usize) -> BoundedCache<u64> {
  BoundedCache::builder()
    .max_size(capacity)
    .default_ttl(Duration::from_secs(3600))
    .build()
    .unwrap()
}

fn bench_get_hit(c: &mut Criterion) {
  let mut group = c.benchmark_group("BoundedCache/get_hit");
  for &capacity in CAPACITIES {
    let cache = build_cache(capacity);
    let keys: Vec<String> = (0..capacity).map(|i| format!("key-{i}")).collect();
    for (i, key) in keys.iter().enumerate() {
      cache.set(key.as_str(), i as u64, None);
    }

    group.throughput(Throughput::Elements(1));
    group.bench_with_input(BenchmarkId::from_parameter(capacity), &keys, |b, keys| {
      let mut i = 0;
      b.iter(|| {
        let key = &keys[i % keys.len()];
        i = i.wrapping_add(7);
        black_box(cache.get(key))
      })
    });
  }
  group.finish();
}

fn bench_set_with_eviction(c: &mut Criterion) {
  let mut group = c.benchmark_group("BoundedCache/set_evicting");
  for &capacity in CAPACITIES {
    let cache = build_cache(capacity);
    for i in 0..capacity {
      cache.set(format!("warm-{i}"), i as u64, None);
    }

    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::from_parameter(capacity), |b| {
      let mut i: u64 = 0;
      b.iter(|| {
        cache.set(format!("new-{i}"), black_box(i), None);
        i += 1;
      })
    });
  }
  group.finish();
}

fn bench_locator_key(c: &mut Criterion) {
  c.bench_function("ResourceLocatorCache/key_for", |b| {
    b.iter(|| {
      black_box(ResourceLocatorCache::key_for(
        black_box("resource-1234"),
        black_box(["webp", "Mobile", "retina", "webp"]),
      ))
    })
  });
}

fn bench_select(c: &mut Criterion) {
  let selector = ResourceSelector::new();
  let env = EnvironmentProfile::new(TargetClass::Medium, LinkQuality::Slow)
    .supporting(["avif", "webp", "jpeg"]);
  let encodings = ["avif", "webp", "jpeg", "png"];
  let classes = ["small", "medium", "large"];

  let mut group = c.benchmark_group("ResourceSelector/select");
  for &count in &[4usize, 16, 64] {
    let candidates: Vec<ResourceDescriptor> = (0..count)
      .map(|i| {
        ResourceDescriptor::new(format!("d{i}"))
          .with_tags([encodings[i % encodings.len()], classes[i % classes.len()]])
          .with_locator(format!("https://cdn.example/d{i}"))
      })
      .collect();
    let exclude = HashSet::new();

    group.throughput(Throughput::Elements(count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
      b.iter(|| black_box(selector.select(candidates, &env, &exclude)))
    });
  }
  group.finish();
}

criterion_group!(
  benches,
  bench_get_hit,
  bench_set_with_eviction,
  bench_locator_key,
  bench_select
);
criterion_main!(benches);
