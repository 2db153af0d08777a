use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use homestay::client::{RefundQuery, SortOrder};
use homestay::models::{AccommodationRateCard, BookingDraft, MealType, RefundRequest, RefundStatus};
use homestay::services::pricing::{compute_amount, validate_booking};
use std::hint::black_box;
use uuid::Uuid;

fn benchmark_pricing(c: &mut Criterion) {
    let rates = AccommodationRateCard {
        veg_rate: 150,
        non_veg_rate: 250,
        price_per_night: 500,
    };
    let draft = BookingDraft {
        stay_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 5),
        group_size: 12,
        group_name: "Ridge Walkers".to_string(),
        need_stay: true,
        stay_night: 3,
        meal_type: MealType::NonVeg,
        phone: "9876543210".to_string(),
    };
    let today = chrono::NaiveDate::from_ymd_opt(2029, 12, 1).expect("valid date");

    let mut group = c.benchmark_group("pricing");
    group.bench_function("compute_amount", |b| {
        b.iter(|| compute_amount(black_box(&draft), black_box(&rates)))
    });
    group.bench_function("validate_booking", |b| {
        b.iter(|| validate_booking(black_box(&draft), black_box(today)))
    });
    group.finish();
}

fn benchmark_refund_projection(c: &mut Criterion) {
    // A heavy user's refund history, one request per day
    let start = Utc.with_ymd_and_hms(2029, 1, 1, 6, 0, 0).unwrap();
    let owner = Uuid::new_v4();
    let refunds: Vec<RefundRequest> = (0..500)
        .map(|i| {
            RefundRequest::initiate(
                Uuid::new_v4(),
                owner,
                100 + i,
                "rain",
                start + Duration::days(i as i64),
            )
        })
        .collect();

    let newest = RefundQuery::default();
    let filtered = RefundQuery {
        status: Some(RefundStatus::Initiated),
        date: chrono::NaiveDate::from_ymd_opt(2029, 6, 1),
        sort: SortOrder::Oldest,
    };

    let mut group = c.benchmark_group("refund_projection");
    group.bench_function("sort_newest", |b| {
        b.iter(|| newest.apply(black_box(&refunds)))
    });
    group.bench_function("filter_status_and_date", |b| {
        b.iter(|| filtered.apply(black_box(&refunds)))
    });
    group.finish();
}

criterion_group!(benches, benchmark_pricing, benchmark_refund_projection);
criterion_main!(benches);
