//! Benchmark for frame decoding, compressed and uncompressed positions.
//!

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use skytrack_formats::parse_frame;

const COMPRESSED: &str = "W3EAX-13>APRS,N3KTX-10*,WIDE1,WIDE2-1,qAR,N3TJJ-11:!/:J..:sh'O   /A=053614|!g|  /W3EAX,313,0,21'C,nearspace.umd.edu";
const UNCOMPRESSED: &str =
    "KC3SKW-9>APRS,WIDE2-1:@031436z3900.00N/07600.00WO088/036/A=003281 T=21 V=4.10 Hello there";

fn do_compressed(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2019, 2, 3, 14, 40, 0).unwrap();

    c.bench_function("compressed", move |b| {
        b.iter(|| {
            let _ = black_box(parse_frame(COMPRESSED, now));
        })
    });
}

fn do_uncompressed(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2019, 2, 3, 14, 40, 0).unwrap();

    c.bench_function("uncompressed", move |b| {
        b.iter(|| {
            let _ = black_box(parse_frame(UNCOMPRESSED, now));
        })
    });
}

fn do_truncated(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2019, 2, 3, 14, 40, 0).unwrap();
    let cut = &COMPRESSED[..60];

    c.bench_function("truncated", move |b| {
        b.iter(|| {
            let _ = black_box(parse_frame(cut, now));
        })
    });
}

criterion_group!(benches, do_compressed, do_uncompressed, do_truncated);

criterion_main!(benches);
