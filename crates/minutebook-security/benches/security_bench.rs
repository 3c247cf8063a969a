// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for digesting and audit logging in the
// minutebook-security crate.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use minutebook_security::{AuditLog, digest};

/// SHA-256 digest at sizes typical of certified minute-book entries.
///
/// The fixed-point resolver rehashes the whole output on every cycle, so
/// this bounds the hashing share of one certification.
fn bench_digest(c: &mut Criterion) {
    let sizes: &[(&str, usize)] = &[
        ("64 KiB", 64 * 1024),
        ("512 KiB", 512 * 1024),
        ("4 MiB", 4 * 1024 * 1024),
    ];

    let mut group = c.benchmark_group("digest_sha256");
    for &(label, size) in sizes {
        let data = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::from_parameter(label), &data, |b, data| {
            b.iter(|| black_box(digest(black_box(data))));
        });
    }
    group.finish();
}

/// Insert throughput of the in-memory audit log.
fn bench_audit_record(c: &mut Criterion) {
    let log = AuditLog::open_in_memory().expect("open audit log");
    let hash = "ab".repeat(32);

    c.bench_function("audit_record (in-memory)", |b| {
        b.iter(|| {
            log.record("certify", "entry-bench", black_box(&hash), None, true, None)
                .expect("record failed");
        });
    });
}

criterion_group!(benches, bench_digest, bench_audit_record);
criterion_main!(benches);
