use criterion::{criterion_group, criterion_main, Criterion};
use search_core::tokenizer::tokenize;

const TEXT: &str = "The lighthouse stood on the rocky headland for two centuries, \
guiding ships past the treacherous shoals. Its keepers recorded every storm in \
leather-bound logbooks (see also: references, retrieved January 1901).";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(200);
    c.bench_function("tokenize_article", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
