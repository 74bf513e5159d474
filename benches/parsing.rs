use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use emlkit::model::source::InputFile;

fn fixture(name: &str) -> InputFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    InputFile::load(path).unwrap()
}

fn bench_decode_eml(c: &mut Criterion) {
    let nested = fixture("nested.eml");
    let attachments = fixture("attachments.eml");

    c.bench_function("decode_nested_eml", |b| {
        b.iter(|| emlkit::parser::decode_file(&nested).unwrap())
    });
    c.bench_function("decode_attachments_eml", |b| {
        b.iter(|| emlkit::parser::decode_file(&attachments).unwrap())
    });
}

fn bench_merge(c: &mut Criterion) {
    let message = emlkit::parser::decode_file(&fixture("attachments.eml")).unwrap();
    let pdf = message.attachments[0].clone();
    let inputs = vec![pdf; 20];

    c.bench_function("merge_20_pdfs", |b| {
        b.iter(|| emlkit::pdf::merge::merge_pdfs(&inputs).unwrap())
    });
}

criterion_group!(benches, bench_decode_eml, bench_merge);
criterion_main!(benches);
