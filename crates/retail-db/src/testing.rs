//! Shared in-memory fixture for the crate's tests.

use retail_core::{Branch, Product, Role, User};

use crate::ledger::StockLedger;
use crate::pool::{Database, DbConfig};
use crate::repository::branch::NewBranch;
use crate::repository::product::NewProduct;

/// A migrated in-memory database with an HQ, one branch, two products and
/// two users. No stock rows exist until a test adds them.
pub(crate) struct Fixture {
    pub db: Database,
    pub hq: Branch,
    pub branch: Branch,
    pub coke: Product,
    pub fanta: Product,
    pub admin: User,
    pub customer: User,
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(DbConfig::in_memory()).await
}

/// Same data on any database, e.g. a file with several pooled writers.
pub(crate) async fn fixture_with(config: DbConfig) -> Fixture {
    let db = Database::new(config).await.expect("database");

    let hq = db
        .branches()
        .create(&NewBranch {
            name: "Nairobi HQ".to_string(),
            location: "Nairobi CBD".to_string(),
            is_headquarters: true,
        })
        .await
        .expect("hq");
    let branch = db
        .branches()
        .create(&NewBranch {
            name: "Kisumu".to_string(),
            location: "Oginga Odinga Rd".to_string(),
            is_headquarters: false,
        })
        .await
        .expect("branch");

    let coke = db
        .products()
        .create(&NewProduct {
            name: "Coke 500ml".to_string(),
            brand: "Coke".to_string(),
            description: None,
            price_cents: 6_500,
        })
        .await
        .expect("coke");
    let fanta = db
        .products()
        .create(&NewProduct {
            name: "Fanta Orange 500ml".to_string(),
            brand: "Fanta".to_string(),
            description: None,
            price_cents: 6_000,
        })
        .await
        .expect("fanta");

    let admin = db
        .users()
        .create("Admin", "admin@example.com", "$argon2id$test", Role::Admin)
        .await
        .expect("admin");
    let customer = db
        .users()
        .create("Akinyi", "akinyi@example.com", "$argon2id$test", Role::Customer)
        .await
        .expect("customer");

    Fixture {
        db,
        hq,
        branch,
        coke,
        fanta,
        admin,
        customer,
    }
}

impl Fixture {
    /// Sets a stock level through the audited adjustment path.
    pub async fn stock(&self, branch_id: &str, product_id: &str, quantity: i64) {
        let mut tx = self.db.pool().begin().await.expect("begin");
        StockLedger::set(&mut tx, branch_id, product_id, quantity, "test setup", &self.admin.id)
            .await
            .expect("set stock");
        tx.commit().await.expect("commit");
    }
}
