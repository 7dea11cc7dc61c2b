use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{
    Order, OrderProduct, OrderStatus, Store, Transaction, Unit, User, Wallet, WithdrawPayment,
    WithdrawRequest, WithdrawStatus,
};
use crate::error::{AppError, AppResult};
use crate::Amount;

const USER_COLUMNS: &str =
    "id, name, phone_no, role, balance, version, is_locked, is_verified, created_at, updated_at";

// Database repository
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn Unit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnit { tx }))
    }
}

pub struct PgUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn duplicate_or(err: sqlx::Error, transaction_id: &str) -> AppError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateTransaction(transaction_id.to_string())
        }
        _ => AppError::Database(err),
    }
}

#[async_trait]
impl Unit for PgUnit {
    async fn find_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn lock_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn update_balance(
        &mut self,
        user_id: Uuid,
        expected_version: i64,
        balance: Amount,
        lock: bool,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = $1, version = version + 1, is_locked = is_locked OR $2, updated_at = NOW()
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(balance)
        .bind(lock)
        .bind(user_id)
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_verified(&mut self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_reference(&mut self, reference: &str) -> AppResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(reference)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM transactions WHERE transaction_id = $1)")
                .bind(transaction_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, transaction_id, user_id, user_name, user_phone_no, amount,
                transaction_type, reason, payment_method, payment_phone_no, remarks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.transaction_id)
        .bind(transaction.user_id)
        .bind(&transaction.user_name)
        .bind(&transaction.user_phone_no)
        .bind(transaction.amount)
        .bind(transaction.transaction_type)
        .bind(transaction.reason)
        .bind(&transaction.payment_method)
        .bind(&transaction.payment_phone_no)
        .bind(&transaction.remarks)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| duplicate_or(err, &transaction.transaction_id))?;
        Ok(())
    }

    async fn list_transactions(&mut self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_order(&mut self, order: &Order, products: &[OrderProduct]) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, seller_id, seller_name, seller_phone_no, customer_name,
                customer_phone_no, customer_zilla, customer_upazilla, delivery_address, comments,
                order_status, cancelled_by_user, transaction_verified,
                is_delivery_charge_paid_by_seller, delivery_charge, delivery_charge_paid_by_seller,
                transaction_id, payment_phone_no, total_product_quantity, total_product_base_price,
                total_product_selling_price, total_commission, actual_commission,
                amount_paid_by_customer, courier_name, tracking_url, remarks, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
            "#,
        )
        .bind(order.id)
        .bind(order.seller_id)
        .bind(&order.seller_name)
        .bind(&order.seller_phone_no)
        .bind(&order.customer_name)
        .bind(&order.customer_phone_no)
        .bind(&order.customer_zilla)
        .bind(&order.customer_upazilla)
        .bind(&order.delivery_address)
        .bind(&order.comments)
        .bind(order.order_status)
        .bind(order.cancelled_by_user)
        .bind(order.transaction_verified)
        .bind(order.is_delivery_charge_paid_by_seller)
        .bind(order.delivery_charge)
        .bind(order.delivery_charge_paid_by_seller)
        .bind(&order.transaction_id)
        .bind(&order.payment_phone_no)
        .bind(order.total_product_quantity)
        .bind(order.total_product_base_price)
        .bind(order.total_product_selling_price)
        .bind(order.total_commission)
        .bind(order.actual_commission)
        .bind(order.amount_paid_by_customer)
        .bind(&order.courier_name)
        .bind(&order.tracking_url)
        .bind(&order.remarks)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| duplicate_or(err, order.transaction_id.as_deref().unwrap_or_default()))?;

        if products.is_empty() {
            return Ok(());
        }

        // generate our query
        let mut query_builder = sqlx::QueryBuilder::<Postgres>::new(
            "INSERT INTO order_products (id, order_id, product_id, product_name, product_base_price, \
             product_selling_price, product_quantity, product_total_base_price, \
             product_total_selling_price, selected_options) ",
        );
        query_builder.push_values(products, |mut row, product| {
            row.push_bind(product.id)
                .push_bind(product.order_id)
                .push_bind(product.product_id)
                .push_bind(&product.product_name)
                .push_bind(product.product_base_price)
                .push_bind(product.product_selling_price)
                .push_bind(product.product_quantity)
                .push_bind(product.product_total_base_price)
                .push_bind(product.product_total_selling_price)
                .push_bind(&product.selected_options);
        });
        query_builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn find_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn lock_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn order_products(&mut self, order_id: Uuid) -> AppResult<Vec<OrderProduct>> {
        let products = sqlx::query_as::<_, OrderProduct>(
            "SELECT * FROM order_products WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(products)
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET order_status = $1, cancelled_by_user = $2, transaction_verified = $3,
                transaction_id = $4, actual_commission = $5, amount_paid_by_customer = $6,
                courier_name = $7, tracking_url = $8, remarks = $9, updated_at = NOW()
            WHERE id = $10
            "#,
        )
        .bind(order.order_status)
        .bind(order.cancelled_by_user)
        .bind(order.transaction_verified)
        .bind(&order.transaction_id)
        .bind(order.actual_commission)
        .bind(order.amount_paid_by_customer)
        .bind(&order.courier_name)
        .bind(&order.tracking_url)
        .bind(&order.remarks)
        .bind(order.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_completed_orders(&mut self, seller_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE seller_id = $1 AND order_status = $2",
        )
        .bind(seller_id)
        .bind(OrderStatus::Completed)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn order_transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE transaction_id = $1)")
                .bind(transaction_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, wallet_name, wallet_phone_no, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(wallet.wallet_name)
        .bind(&wallet.wallet_phone_no)
        .bind(wallet.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_wallets(&mut self, user_id: Uuid) -> AppResult<Vec<Wallet>> {
        let wallets = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(wallets)
    }

    async fn insert_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdraw_requests (id, user_id, user_name, user_phone_no, amount,
                actual_amount, transaction_fee, wallet_name, wallet_phone_no, status,
                requested_at, processed_at, remarks, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(&request.user_name)
        .bind(&request.user_phone_no)
        .bind(request.amount)
        .bind(request.actual_amount)
        .bind(request.transaction_fee)
        .bind(request.wallet_name)
        .bind(&request.wallet_phone_no)
        .bind(request.status)
        .bind(request.requested_at)
        .bind(request.processed_at)
        .bind(&request.remarks)
        .bind(&request.transaction_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        let request = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(withdraw_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn update_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE withdraw_requests
            SET status = $1, processed_at = $2, remarks = $3, transaction_id = $4
            WHERE id = $5
            "#,
        )
        .bind(request.status)
        .bind(request.processed_at)
        .bind(&request.remarks)
        .bind(&request.transaction_id)
        .bind(request.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM withdraw_requests WHERE id = $1")
            .bind(withdraw_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_pending_withdraw(&mut self, user_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        let request = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE user_id = $1 AND status = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(WithdrawStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn count_withdraws_since(&mut self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM withdraw_requests WHERE user_id = $1 AND requested_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn list_withdraws(&mut self, user_id: Uuid) -> AppResult<Vec<WithdrawRequest>> {
        let requests = sqlx::query_as::<_, WithdrawRequest>(
            "SELECT * FROM withdraw_requests WHERE user_id = $1 ORDER BY requested_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(requests)
    }

    async fn insert_withdraw_payment(&mut self, payment: &WithdrawPayment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdraw_payments (id, withdraw_id, user_id, amount, actual_amount,
                transaction_fee, wallet_name, wallet_phone_no, transaction_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.withdraw_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(payment.actual_amount)
        .bind(payment.transaction_fee)
        .bind(payment.wallet_name)
        .bind(&payment.wallet_phone_no)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| duplicate_or(err, &payment.transaction_id))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
