use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use team_roster_scraper::RawDocument;
use team_roster_scraper::alias::build_alias_table;
use team_roster_scraper::normalize::normalize;
use team_roster_scraper::objects::split_objects;
use team_roster_scraper::observe::ExtractContext;
use team_roster_scraper::pipeline::{extract_roster, extract_rosters_parallel_quiet};

const TEAM_PAGE: &str = include_str!("../tests/fixtures/team_page.html");

const CLOSURE: &str = r#"(function(a,b,c,d){return {data:[{teamMemberData:[]}]}}("forward","midfielder",!0,void 0))"#;

fn member_literals(n: usize) -> String {
    (0..n)
        .map(|i| {
            format!(
                r#"{{person_id:"{}",person_name:"Player {i}",type:a,shirt_number:{},is_captain:!1,injury:void 0,}}"#,
                50_000 + i,
                i % 99
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn bench_alias_table(c: &mut Criterion) {
    c.bench_function("alias_table", |b| {
        b.iter(|| black_box(build_alias_table(black_box(CLOSURE)).len()))
    });
}

fn bench_split_and_normalize(c: &mut Criterion) {
    let aliases = build_alias_table(CLOSURE);
    let literals = member_literals(40);
    c.bench_function("split_and_normalize_40", |b| {
        b.iter(|| {
            let n = split_objects(black_box(&literals))
                .filter_map(|lit| normalize(lit, &aliases).ok())
                .count();
            black_box(n);
        })
    });
}

fn bench_extract_roster(c: &mut Criterion) {
    let doc = RawDocument::new("bench://team", TEAM_PAGE);
    c.bench_function("extract_roster_team_page", |b| {
        b.iter(|| {
            let mut ctx = ExtractContext::new("bench://team");
            black_box(extract_roster(black_box(&doc), &mut ctx).len());
        })
    });
}

fn bench_extract_parallel(c: &mut Criterion) {
    let docs: Vec<RawDocument> = (0..32)
        .map(|i| RawDocument::new(format!("bench://team/{i}"), TEAM_PAGE))
        .collect();
    c.bench_function("extract_rosters_parallel_32", |b| {
        b.iter(|| black_box(extract_rosters_parallel_quiet(black_box(&docs)).len()))
    });
}

criterion_group!(
    benches,
    bench_alias_table,
    bench_split_and_normalize,
    bench_extract_roster,
    bench_extract_parallel
);
criterion_main!(benches);
