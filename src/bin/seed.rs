use furniture_store::{
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "Store Admin", "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "Abebe Kebede", "user@example.com", "user123", "user").await?;
    let courier_id =
        ensure_user(&pool, "Dawit Courier", "courier@example.com", "courier123", "courier").await?;
    seed_catalog(&pool).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, User ID: {user_id}, Courier ID: {courier_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    name: &str,
    slug: &str,
    parent_id: Option<Uuid>,
    sort_order: i32,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, slug, parent_id, sort_order)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slug)
    .bind(parent_id)
    .bind(sort_order)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let living = ensure_category(pool, "Living Room", "living-room", None, 1).await?;
    let sofas = ensure_category(pool, "Sofas", "sofas", Some(living), 1).await?;
    let bedroom = ensure_category(pool, "Bedroom", "bedroom", None, 2).await?;
    let dining = ensure_category(pool, "Dining", "dining", None, 3).await?;
    let office = ensure_category(pool, "Office", "office", None, 4).await?;

    // Prices are in cents.
    let products = [
        ("Walnut Three-Seat Sofa", "Solid walnut frame, linen upholstery", 8_999_900_i64, 6, sofas, "/images/sofa-walnut.jpg,/images/sofa-walnut-side.jpg"),
        ("Velvet Loveseat", "Two-seat velvet loveseat in emerald", 4_599_900, 4, sofas, "/images/loveseat.jpg"),
        ("Oak Coffee Table", "Round oak table with lower shelf", 1_899_900, 12, living, "/images/coffee-table.jpg"),
        ("Queen Platform Bed", "Low platform bed with slatted base", 6_499_900, 5, bedroom, "/images/platform-bed.jpg"),
        ("Six-Drawer Dresser", "Soft-close drawers, matte white", 3_299_900, 8, bedroom, "/images/dresser.jpg"),
        ("Extendable Dining Table", "Seats six, extends to eight", 5_799_900, 3, dining, "/images/dining-table.jpg"),
        ("Woven Dining Chair", "Rattan seat on a beech frame", 749_900, 40, dining, "/images/dining-chair.jpg"),
        ("Standing Desk", "Electric height-adjustable desk", 4_199_900, 10, office, "/images/standing-desk.jpg"),
        ("Ergonomic Office Chair", "Mesh back with lumbar support", 2_499_900, 15, office, "/images/office-chair.jpg"),
    ];

    for (name, desc, price, stock, category_id, images) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock_quantity, category_id, image_url)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .bind(category_id)
        .bind(images)
        .execute(pool)
        .await?;
    }

    println!("Seeded categories and products");
    Ok(())
}
