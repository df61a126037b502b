// Criterion benchmarks for Pythh Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pythh_match::core::{
    calculate_match_score, normalize, rank_matches, AcronymSimilarity, InvestorScore, Matcher,
    SubstringSimilarity,
};
use pythh_match::models::{InvestorProfile, ScoringRubric, StartupProfile};
use std::sync::Arc;

const SECTORS: [&str; 8] = [
    "fintech",
    "healthtech",
    "artificial intelligence",
    "climate",
    "developer tools",
    "saas",
    "marketplaces",
    "edtech",
];
const STAGES: [&str; 4] = ["pre-seed", "seed", "series-a", "series-b"];

fn create_investor(id: usize) -> InvestorProfile {
    let sectors = [
        SECTORS[id % SECTORS.len()],
        SECTORS[(id * 7 + 3) % SECTORS.len()],
        SECTORS[(id / 5) % SECTORS.len()],
    ];
    let stages = [STAGES[id % STAGES.len()], STAGES[(id + 1) % STAGES.len()]];
    InvestorProfile::new(format!("inv-{}", id), &sectors, &stages)
}

fn create_startup() -> StartupProfile {
    StartupProfile::new("startup", &["AI", "fintech", "saas"], Some("seed"))
}

fn bench_normalize(c: &mut Criterion) {
    let startup = create_startup();
    let investor = create_investor(2);

    c.bench_function("normalize_pair", |b| {
        b.iter(|| normalize(black_box(&startup), black_box(&investor), &AcronymSimilarity));
    });
}

fn bench_score_and_rank(c: &mut Criterion) {
    let startup = create_startup();
    let rubric = ScoringRubric::default();
    let pool: Vec<InvestorProfile> = (0..200).map(create_investor).collect();

    c.bench_function("score_and_rank_200_investors", |b| {
        b.iter(|| {
            let scores: Vec<InvestorScore> = pool
                .iter()
                .map(|investor| InvestorScore {
                    investor_id: investor.id.clone(),
                    score: calculate_match_score(
                        &normalize(&startup, investor, &AcronymSimilarity),
                        &rubric,
                    ),
                })
                .collect();
            black_box(rank_matches(&startup.id, scores, &rubric))
        });
    });
}

fn bench_matching(c: &mut Criterion) {
    let startup = create_startup();
    let acronym = Matcher::with_default_rubric();
    let substring = Matcher::with_default_rubric().with_predicate(Arc::new(SubstringSimilarity));

    let mut group = c.benchmark_group("matching");

    for pool_size in [10, 50, 200, 1000].iter() {
        let pool: Vec<InvestorProfile> = (0..*pool_size).map(create_investor).collect();

        group.bench_with_input(
            BenchmarkId::new("compute_matches_acronym", pool_size),
            pool_size,
            |b, _| {
                b.iter(|| acronym.compute_matches(black_box(&startup), black_box(&pool)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("compute_matches_substring", pool_size),
            pool_size,
            |b, _| {
                b.iter(|| substring.compute_matches(black_box(&startup), black_box(&pool)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_score_and_rank, bench_matching);

criterion_main!(benches);
