use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AccountService, Caller, CatalogService, LineRequest, NewProduct, OrderService, authorize,
};
use store::InMemoryStore;

struct Seeded {
    orders: OrderService<InMemoryStore>,
    customer: Caller,
    products: Vec<ProductId>,
}

async fn seed(product_count: usize, stock: u32) -> Seeded {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());
    let accounts = AccountService::new(store.clone());
    let admin = Caller::admin(UserId::new());

    let user = accounts
        .register("Bench", "bench@example.com", "hash")
        .await
        .unwrap();

    let mut products = Vec::with_capacity(product_count);
    for i in 0..product_count {
        let product = catalog
            .create_product(
                &admin,
                NewProduct::new(format!("Product {i}"), Money::from_cents(100 + i as i64))
                    .with_stock(stock),
            )
            .await
            .unwrap();
        products.push(product.id);
    }

    Seeded {
        orders: OrderService::new(store),
        customer: Caller::user(user.id),
        products,
    }
}

fn bench_place_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seeded = rt.block_on(seed(1, u32::MAX));

    c.bench_function("domain/place_order_1_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                seeded
                    .orders
                    .place_order(
                        &seeded.customer,
                        vec![LineRequest::new(seeded.products[0], 1)],
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_place_ten_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seeded = rt.block_on(seed(10, u32::MAX));

    c.bench_function("domain/place_order_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let lines = seeded
                    .products
                    .iter()
                    .map(|id| LineRequest::new(*id, 2))
                    .collect();
                seeded
                    .orders
                    .place_order(&seeded.customer, lines)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_rejected_placement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seeded = rt.block_on(seed(10, 0));

    c.bench_function("domain/reject_insufficient_stock", |b| {
        b.iter(|| {
            rt.block_on(async {
                let lines = seeded
                    .products
                    .iter()
                    .map(|id| LineRequest::new(*id, 1))
                    .collect();
                let result = seeded.orders.place_order(&seeded.customer, lines).await;
                assert!(result.is_err());
            });
        });
    });
}

fn bench_authorize(c: &mut Criterion) {
    let caller = Caller::user(UserId::new());
    let owner = Some(caller.user_id);

    c.bench_function("domain/authorize_view_order", |b| {
        b.iter(|| authorize(&caller, domain::Action::ViewOrder, owner).is_ok());
    });
}

criterion_group!(
    benches,
    bench_place_single_line,
    bench_place_ten_lines,
    bench_rejected_placement,
    bench_authorize,
);
criterion_main!(benches);
