use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    execute(db, "PRAGMA foreign_keys = ON").await?;

    // Users are local to each instance and never synced
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS suppliers (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            notes TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            notes TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS vehicles (
            id TEXT PRIMARY KEY NOT NULL,
            registration_number TEXT NOT NULL,
            make TEXT,
            model TEXT,
            capacity_kg REAL,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY NOT NULL,
            sku TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            unit TEXT NOT NULL DEFAULT 'pcs',
            unit_price REAL NOT NULL DEFAULT 0,
            cost_price REAL,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            reorder_level INTEGER NOT NULL DEFAULT 0,
            supplier_id TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (supplier_id) REFERENCES suppliers(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS deliveries (
            id TEXT PRIMARY KEY NOT NULL,
            reference TEXT NOT NULL UNIQUE,
            delivery_type TEXT NOT NULL, -- 'incoming', 'outgoing'
            supplier_id TEXT,
            customer_id TEXT,
            vehicle_id TEXT,
            scheduled_date TEXT,
            delivered_date TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            notes TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (supplier_id) REFERENCES suppliers(id) ON DELETE RESTRICT,
            FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE RESTRICT,
            FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS delivery_items (
            id TEXT PRIMARY KEY NOT NULL,
            delivery_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price REAL,
            is_processed INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (delivery_id) REFERENCES deliveries(id) ON DELETE RESTRICT,
            FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS stock_adjustments (
            id TEXT PRIMARY KEY NOT NULL,
            product_id TEXT NOT NULL,
            delivery_id TEXT,
            quantity_change INTEGER NOT NULL,
            previous_quantity INTEGER NOT NULL,
            new_quantity INTEGER NOT NULL,
            reason TEXT NOT NULL,
            notes TEXT,
            adjusted_by TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE RESTRICT,
            FOREIGN KEY (delivery_id) REFERENCES deliveries(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS stock_alerts (
            id TEXT PRIMARY KEY NOT NULL,
            product_id TEXT NOT NULL,
            alert_type TEXT NOT NULL, -- 'low_stock', 'out_of_stock'
            current_quantity INTEGER NOT NULL,
            threshold INTEGER NOT NULL,
            is_resolved INTEGER NOT NULL DEFAULT 0,
            resolved_date TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE RESTRICT
        )
        "#,
    )
    .await?;

    // Sync journal: outbox on a device, inbox on the server
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS operation_log (
            id TEXT PRIMARY KEY NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT, -- JSON payload of the change
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            created_at TEXT NOT NULL,
            processed_at TEXT
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            name TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Indexes
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_products_sku ON products(sku)",
        "CREATE INDEX IF NOT EXISTS idx_products_supplier_id ON products(supplier_id)",
        "CREATE INDEX IF NOT EXISTS idx_deliveries_status ON deliveries(status)",
        "CREATE INDEX IF NOT EXISTS idx_deliveries_type ON deliveries(delivery_type)",
        "CREATE INDEX IF NOT EXISTS idx_delivery_items_delivery_id ON delivery_items(delivery_id)",
        "CREATE INDEX IF NOT EXISTS idx_stock_adjustments_product_id ON stock_adjustments(product_id)",
        "CREATE INDEX IF NOT EXISTS idx_stock_alerts_product_id ON stock_alerts(product_id)",
        "CREATE INDEX IF NOT EXISTS idx_operation_log_status ON operation_log(status, created_at)",
        // Change feed scans
        "CREATE INDEX IF NOT EXISTS idx_suppliers_updated_at ON suppliers(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_customers_updated_at ON customers(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_vehicles_updated_at ON vehicles(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_products_updated_at ON products(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_deliveries_updated_at ON deliveries(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_delivery_items_updated_at ON delivery_items(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_stock_adjustments_updated_at ON stock_adjustments(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_stock_alerts_updated_at ON stock_alerts(updated_at)",
    ];
    for sql in indexes {
        execute(db, sql).await?;
    }

    tracing::debug!("Database schema is up to date");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = init_db("sqlite::memory:").await.expect("Failed to init db");
        run_migrations(&db).await.expect("Second run should succeed");
    }
}
