//! Transaction, category, budget and statistics endpoints.

use tracing::debug;

use crate::models::{
    Budget, BudgetFilter, Category, CategoryFilter, DefaultCategories, ListResponse, NewBudget,
    NewCategory, NewTransaction, StatsRange, Transaction, TransactionFilter, TransactionStats,
};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    // ===== Transactions =====

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        let list: ListResponse<Transaction> = self.get("/transactions/", filter.to_query()).await?;
        let transactions = list.into_vec();
        debug!(count = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }

    pub async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, ApiError> {
        self.post("/transactions/", tx).await
    }

    pub async fn fetch_transaction(&self, id: i64) -> Result<Transaction, ApiError> {
        self.get(&format!("/transactions/{}/", id), Vec::new()).await
    }

    pub async fn update_transaction(
        &self,
        id: i64,
        tx: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        self.put(&format!("/transactions/{}/", id), tx).await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/transactions/{}/", id)).await
    }

    pub async fn fetch_stats(&self, range: &StatsRange) -> Result<TransactionStats, ApiError> {
        self.get("/stats/", range.to_query()).await
    }

    // ===== Categories =====

    pub async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>, ApiError> {
        let list: ListResponse<Category> = self.get("/categories/", filter.to_query()).await?;
        Ok(list.into_vec())
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<Category, ApiError> {
        self.post("/categories/", category).await
    }

    pub async fn fetch_category(&self, id: i64) -> Result<Category, ApiError> {
        self.get(&format!("/categories/{}/", id), Vec::new()).await
    }

    pub async fn update_category(
        &self,
        id: i64,
        category: &NewCategory,
    ) -> Result<Category, ApiError> {
        self.put(&format!("/categories/{}/", id), category).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/categories/{}/", id)).await
    }

    /// Create the backend's starter income and expense categories.
    /// Categories the user already has are left alone and not returned.
    pub async fn create_default_categories(&self) -> Result<DefaultCategories, ApiError> {
        self.send_json(&ApiRequest::post("/categories/create-defaults/"))
            .await
    }

    // ===== Budgets =====

    pub async fn list_budgets(&self, filter: &BudgetFilter) -> Result<Vec<Budget>, ApiError> {
        let list: ListResponse<Budget> = self.get("/budgets/", filter.to_query()).await?;
        Ok(list.into_vec())
    }

    pub async fn create_budget(&self, budget: &NewBudget) -> Result<Budget, ApiError> {
        self.post("/budgets/", budget).await
    }

    pub async fn fetch_budget(&self, id: i64) -> Result<Budget, ApiError> {
        self.get(&format!("/budgets/{}/", id), Vec::new()).await
    }

    pub async fn update_budget(&self, id: i64, budget: &NewBudget) -> Result<Budget, ApiError> {
        self.put(&format!("/budgets/{}/", id), budget).await
    }

    pub async fn delete_budget(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/budgets/{}/", id)).await
    }
}
