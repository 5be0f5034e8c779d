use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use newsroom_pipeline::events::extract_events;

const SAMPLE_ARTICLE: &str = "\
The town council will hold a public budget workshop on Tuesday, March 14, 2026 at 6:30 PM \
at the Central Park community center. Residents are encouraged to attend and review the \
proposed capital improvement plan. A second session covering the school bond referendum is \
scheduled for Wednesday, March 15, 2026 at 7:00 PM in the same location. The fire department \
will also host an open house on Saturday, March 18, 2026 starting at 10:00 AM. Organizers say \
turnout at last year's event exceeded 200 residents, and they expect similar interest this year. \
A farmers market kicks off Saturday, March 18, 2026 at 9:00 AM downtown, running through October.";

fn bench_extract_events(c: &mut Criterion) {
    c.bench_function("extract_events", |b| {
        let now = Utc::now();
        b.iter(|| extract_events(SAMPLE_ARTICLE, now));
    });
}

criterion_group!(benches, bench_extract_events);
criterion_main!(benches);
