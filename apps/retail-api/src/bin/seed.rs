//! # Seed Data Generator
//!
//! Populates the database with the branch network, the soft-drink catalog,
//! opening HQ stock and the first admin account.
//!
//! ## Usage
//! ```bash
//! # Seed ./retail.db (or $DATABASE_PATH)
//! cargo run -p retail-api --bin seed
//!
//! # Specify database path
//! cargo run -p retail-api --bin seed -- --db ./data/retail.db
//! ```
//!
//! ## Environment
//! - `ADMIN_EMAIL` (default `admin@retail.local`)
//! - `ADMIN_PASSWORD` (default `admin123`)
//!
//! Re-running is safe: existing branches, products, stock rows and the admin
//! are left untouched.

use std::env;

use retail_api::auth::hash_password;
use retail_core::Role;
use retail_db::repository::branch::NewBranch;
use retail_db::repository::product::NewProduct;
use retail_db::repository::stock::StockAdjustment;
use retail_db::{Database, DbConfig};

const HEADQUARTERS: (&str, &str) = ("Nairobi HQ", "Nairobi CBD");

const BRANCHES: &[(&str, &str)] = &[
    ("Kisumu", "Oginga Odinga Street"),
    ("Mombasa", "Moi Avenue"),
    ("Nakuru", "Kenyatta Avenue"),
    ("Eldoret", "Uganda Road"),
];

/// (name, brand, price in cents)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Coke 300ml", "Coke", 4_000),
    ("Coke 500ml", "Coke", 6_500),
    ("Coke 1L", "Coke", 10_000),
    ("Coke 2L", "Coke", 18_000),
    ("Fanta Orange 500ml", "Fanta", 6_000),
    ("Fanta Passion 500ml", "Fanta", 6_000),
    ("Fanta Orange 2L", "Fanta", 17_000),
    ("Sprite 500ml", "Sprite", 6_000),
    ("Sprite 1L", "Sprite", 9_500),
    ("Sprite 2L", "Sprite", 17_000),
];

const OPENING_HQ_STOCK: i64 = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let db_path = args
        .iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| env::var("DATABASE_PATH").ok())
        .unwrap_or_else(|| "./retail.db".to_string());

    println!("Seeding {}", db_path);
    let db = Database::new(DbConfig::new(&db_path)).await?;

    // Admin first: stock adjustments are attributed to it.
    let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@retail.local".to_string());
    let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let admin_id = match db.users().find_credentials(&admin_email.to_lowercase()).await? {
        Some(existing) => {
            println!("  admin {} exists", existing.user.email);
            existing.user.id
        }
        None => {
            let hash = hash_password(&admin_password)?;
            let admin = db
                .users()
                .create("Administrator", &admin_email, &hash, Role::Admin)
                .await?;
            println!("✓ admin {}", admin.email);
            admin.id
        }
    };

    let hq = match db.branches().get_headquarters().await? {
        Some(hq) => hq,
        None => {
            let hq = db
                .branches()
                .create(&NewBranch {
                    name: HEADQUARTERS.0.to_string(),
                    location: HEADQUARTERS.1.to_string(),
                    is_headquarters: true,
                })
                .await?;
            println!("✓ headquarters {}", hq.name);
            hq
        }
    };

    for (name, location) in BRANCHES {
        if db.branches().find_by_name(name).await?.is_some() {
            continue;
        }
        db.branches()
            .create(&NewBranch {
                name: name.to_string(),
                location: location.to_string(),
                is_headquarters: false,
            })
            .await?;
        println!("✓ branch {}", name);
    }

    let mut stocked = 0;
    for (name, brand, price_cents) in PRODUCTS {
        let product = match db.products().find_by_name_and_brand(name, brand).await? {
            Some(p) => p,
            None => {
                let p = db
                    .products()
                    .create(&NewProduct {
                        name: name.to_string(),
                        brand: brand.to_string(),
                        description: None,
                        price_cents: *price_cents,
                    })
                    .await?;
                println!("✓ product {}", p.name);
                p
            }
        };

        if db.stock().get(&hq.id, &product.id).await?.is_none() {
            db.stock()
                .adjust(
                    &StockAdjustment {
                        branch_id: hq.id.clone(),
                        product_id: product.id.clone(),
                        quantity: OPENING_HQ_STOCK,
                        reason: "Opening HQ stock".to_string(),
                    },
                    &admin_id,
                )
                .await?;
            stocked += 1;
        }
    }
    println!("✓ opening stock for {} products at {}", stocked, hq.name);

    db.close().await;
    println!();
    println!("✓ Seed complete!");
    Ok(())
}
