//! Candidate Pipeline Benchmarks
//!
//! Benchmarks for candidate synthesis, ranking, script parsing and diffing.
//!
//! Run with: `cargo bench --bench synth_ops`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sanar::report::diff_lines;
use sanar::robot::Document;
use sanar::{rank_with_adapter, ActionIntent, SnapshotAdapter, Synthesizer, Technology, WebLibrary};

const SELENIUM: Technology = Technology::Web(WebLibrary::Selenium);

/// Login form padded with `rows` table rows of noise
fn page(rows: usize) -> String {
    let mut html = String::from(
        r#"<html><body><form id="login">
<input id="username" name="user" type="text" placeholder="User name">
<input id="password" name="pass" type="password">
<button id="submit" type="submit">Log in</button>
</form><table>"#,
    );
    for i in 0..rows {
        html.push_str(&format!(
            r#"<tr class="row"><td>{i}</td><td><a href="/item/{i}">Item {i}</a></td></tr>"#
        ));
    }
    html.push_str("</table></body></html>");
    html
}

fn script(steps: usize) -> String {
    let mut text = String::from("*** Variables ***\n${ROOT}    css=form#login\n\n*** Test Cases ***\nLogin\n");
    for i in 0..steps {
        text.push_str(&format!("    Input Text    id=field-{i}    value {i}\n"));
    }
    text
}

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");

    for rows in [0, 100, 1000] {
        let html = page(rows);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{rows}_rows")), &html, |bench, html| {
            let synth = Synthesizer::new(SELENIUM);
            bench.iter(|| {
                let list = synth.synthesize(black_box(html), black_box("id=user-name"), ActionIntent::TextEntry);
                black_box(list);
            });
        });
    }

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_with_adapter");

    for rows in [0, 100, 1000] {
        let html = page(rows);
        let adapter = SnapshotAdapter::new(SELENIUM, html.clone());
        let candidates = Synthesizer::new(SELENIUM).synthesize(&html, "id=submit-btn", ActionIntent::Click);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{rows}_rows")), &candidates, |bench, list| {
            bench.iter(|| black_box(rank_with_adapter(black_box(list), &adapter, true)));
        });
    }

    group.finish();
}

fn bench_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_parse_render");

    for steps in [10, 100, 1000] {
        let text = script(steps);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{steps}_steps")), &text, |bench, text| {
            bench.iter(|| {
                let doc = Document::parse("bench.robot", black_box(text)).ok();
                black_box(doc.map(|d| d.render()));
            });
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_lines");

    for steps in [100, 1000] {
        let original = script(steps);
        let healed = original.replacen("id=field-3 ", "css=#field-3 ", 1);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{steps}_lines")),
            &(original, healed),
            |bench, (original, healed)| {
                bench.iter(|| black_box(diff_lines(black_box(original), black_box(healed))));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_synthesize, bench_rank, bench_document, bench_diff);
criterion_main!(benches);
