use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use minisql::{Database, Value};
use std::hint::black_box;

/// In-memory only: no write-through, so each write costs what the engine
/// itself does.
fn empty_db() -> Database {
    Database::new()
}

fn setup_populated_db(n: usize) -> Database {
    let mut db = empty_db();
    db.execute(
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(32), age INT, active BOOLEAN)",
    )
    .unwrap();
    for i in 0..n {
        db.execute(&format!(
            "INSERT INTO users VALUES ({i}, 'user{i}', {}, {})",
            i % 100,
            if i % 2 == 0 { "TRUE" } else { "FALSE" }
        ))
        .unwrap();
    }
    db
}

fn bench_insert_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insert_SQL_Pipeline");
    group.bench_function("insert_single_row_sql", |b| {
        let mut db = empty_db();
        db.execute("CREATE TABLE tests (id INT)").unwrap();
        b.iter(|| {
            db.execute(black_box("INSERT INTO tests VALUES (42)"))
                .unwrap();
        });
    });
    group.finish();
}

fn bench_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("Point_Lookup");

    for n in [1000, 10000].iter() {
        let db = setup_populated_db(*n);
        let target = n / 2;
        group.bench_with_input(BenchmarkId::new("index", n), n, |b, _| {
            let sql = format!("SELECT * FROM users WHERE id = {target}");
            b.iter(|| {
                let res = db.query(black_box(&sql)).unwrap();
                assert_eq!(res.rows[0][0], Value::Int(target as i64));
            });
        });
        group.bench_with_input(BenchmarkId::new("scan", n), n, |b, _| {
            let sql = format!("SELECT * FROM users WHERE name = 'user{target}'");
            b.iter(|| {
                let res = db.query(black_box(&sql)).unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_update_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Update_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || setup_populated_db(n),
                |mut db| {
                    db.execute("UPDATE users SET age = 99 WHERE active = TRUE")
                        .unwrap();
                    black_box(db);
                },
            );
        });
    }
    group.finish();
}

fn bench_delete_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Delete_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || setup_populated_db(n),
                |mut db| {
                    db.execute("DELETE FROM users WHERE age > 90").unwrap();
                    black_box(db);
                },
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sql,
    bench_point_lookup,
    bench_update_performance,
    bench_delete_performance
);
criterion_main!(benches);
