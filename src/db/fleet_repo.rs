// src/db/fleet_repo.rs
//
// Cadastros de frota: motoristas, veículos, clientes/fornecedores e rotas.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::{map_unique_violation, AppResult};
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::{DriverRepository, PartnerRepository, RouteRepository, VehicleRepository};
use crate::models::fleet::{CatalogFilter, Driver, Partner, PartnerKind, Route, Vehicle};

// Predicado comum das listagens: $1 operador, $2 status (ambos opcionais)
const SCOPE_FILTER: &str =
    "($1::uuid IS NULL OR operator_id = $1) AND ($2::bool IS NULL OR status = $2)";

// =============================================================================
//  MOTORISTAS
// =============================================================================

const DRIVER_COLUMNS: &str = "id, operator_id, full_name, rut, license_number, license_expiration, \
                              phone, email, status, created_at, updated_at";
const DUPLICATE_DRIVER: &str = "Já existe um motorista com esse RUT.";

#[derive(Clone)]
pub struct PgDriverRepository {
    pool: PgPool,
}

impl PgDriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverRepository for PgDriverRepository {
    async fn create(&self, d: Driver) -> AppResult<Driver> {
        let sql = format!(
            r#"
            INSERT INTO drivers (id, operator_id, full_name, rut, license_number, license_expiration, phone, email, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DRIVER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Driver>(&sql)
            .bind(d.id)
            .bind(d.operator_id)
            .bind(&d.full_name)
            .bind(&d.rut)
            .bind(&d.license_number)
            .bind(d.license_expiration)
            .bind(&d.phone)
            .bind(&d.email)
            .bind(d.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_DRIVER))
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Driver>> {
        let sql = format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, Driver>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_rut(&self, operator_id: Uuid, rut: &str) -> AppResult<Option<Driver>> {
        let sql = format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE operator_id = $1 AND rut = $2");
        Ok(sqlx::query_as::<_, Driver>(&sql)
            .bind(operator_id)
            .bind(rut)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Driver>> {
        let predicate = format!(
            "{SCOPE_FILTER} AND ($3::text IS NULL OR full_name ILIKE $3 OR rut ILIKE $3)"
        );
        let search = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM drivers WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE {predicate} ORDER BY full_name LIMIT $4 OFFSET $5"
        );
        let data = sqlx::query_as::<_, Driver>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, d: &Driver) -> AppResult<Driver> {
        let sql = format!(
            r#"
            UPDATE drivers
            SET full_name = $2, rut = $3, license_number = $4, license_expiration = $5,
                phone = $6, email = $7, status = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {DRIVER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Driver>(&sql)
            .bind(d.id)
            .bind(&d.full_name)
            .bind(&d.rut)
            .bind(&d.license_number)
            .bind(d.license_expiration)
            .bind(&d.phone)
            .bind(&d.email)
            .bind(d.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_DRIVER))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM drivers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
//  VEÍCULOS
// =============================================================================

const VEHICLE_COLUMNS: &str = "id, operator_id, plate_number, brand, model, year, vehicle_type, \
                               capacity, status, created_at, updated_at";
const DUPLICATE_VEHICLE: &str = "Já existe um veículo com essa patente.";

#[derive(Clone)]
pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn create(&self, v: Vehicle) -> AppResult<Vehicle> {
        let sql = format!(
            r#"
            INSERT INTO vehicles (id, operator_id, plate_number, brand, model, year, vehicle_type, capacity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {VEHICLE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Vehicle>(&sql)
            .bind(v.id)
            .bind(v.operator_id)
            .bind(&v.plate_number)
            .bind(&v.brand)
            .bind(&v.model)
            .bind(v.year)
            .bind(&v.vehicle_type)
            .bind(v.capacity)
            .bind(v.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_VEHICLE))
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Vehicle>> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, Vehicle>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_plate(&self, operator_id: Uuid, plate_number: &str) -> AppResult<Option<Vehicle>> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE operator_id = $1 AND plate_number = $2"
        );
        Ok(sqlx::query_as::<_, Vehicle>(&sql)
            .bind(operator_id)
            .bind(plate_number)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Vehicle>> {
        let predicate = format!(
            "{SCOPE_FILTER} AND ($3::text IS NULL OR plate_number ILIKE $3 OR brand ILIKE $3 OR model ILIKE $3)"
        );
        let search = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM vehicles WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE {predicate} ORDER BY plate_number LIMIT $4 OFFSET $5"
        );
        let data = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, v: &Vehicle) -> AppResult<Vehicle> {
        let sql = format!(
            r#"
            UPDATE vehicles
            SET plate_number = $2, brand = $3, model = $4, year = $5, vehicle_type = $6,
                capacity = $7, status = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {VEHICLE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Vehicle>(&sql)
            .bind(v.id)
            .bind(&v.plate_number)
            .bind(&v.brand)
            .bind(&v.model)
            .bind(v.year)
            .bind(&v.vehicle_type)
            .bind(v.capacity)
            .bind(v.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_VEHICLE))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
//  CLIENTES E FORNECEDORES
// =============================================================================

const PARTNER_COLUMNS: &str = "id, operator_id, business_name, tax_id, contact_name, phone, email, \
                               address, status, created_at, updated_at";

fn duplicate_partner(kind: PartnerKind) -> String {
    format!("{} com essa razão social ou RUT já existe.", kind.label())
}

#[derive(Clone)]
pub struct PgPartnerRepository {
    pool: PgPool,
}

impl PgPartnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// O nome da tabela vem sempre de `PartnerKind::table`, nunca do cliente
#[async_trait]
impl PartnerRepository for PgPartnerRepository {
    async fn create(&self, kind: PartnerKind, p: Partner) -> AppResult<Partner> {
        let sql = format!(
            r#"
            INSERT INTO {table} (id, operator_id, business_name, tax_id, contact_name, phone, email, address, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PARTNER_COLUMNS}
            "#,
            table = kind.table()
        );
        sqlx::query_as::<_, Partner>(&sql)
            .bind(p.id)
            .bind(p.operator_id)
            .bind(&p.business_name)
            .bind(&p.tax_id)
            .bind(&p.contact_name)
            .bind(&p.phone)
            .bind(&p.email)
            .bind(&p.address)
            .bind(p.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &duplicate_partner(kind)))
    }

    async fn find(&self, kind: PartnerKind, scope: &TenantScope, id: Uuid) -> AppResult<Option<Partner>> {
        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM {table} WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)",
            table = kind.table()
        );
        Ok(sqlx::query_as::<_, Partner>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_name(&self, kind: PartnerKind, operator_id: Uuid, name: &str) -> AppResult<Option<Partner>> {
        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM {table} WHERE operator_id = $1 AND business_name = $2",
            table = kind.table()
        );
        Ok(sqlx::query_as::<_, Partner>(&sql)
            .bind(operator_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_tax_id(&self, kind: PartnerKind, operator_id: Uuid, tax_id: &str) -> AppResult<Option<Partner>> {
        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM {table} WHERE operator_id = $1 AND tax_id = $2",
            table = kind.table()
        );
        Ok(sqlx::query_as::<_, Partner>(&sql)
            .bind(operator_id)
            .bind(tax_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        kind: PartnerKind,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Partner>> {
        let table = kind.table();
        let predicate = format!(
            "{SCOPE_FILTER} AND ($3::text IS NULL OR business_name ILIKE $3 OR tax_id ILIKE $3)"
        );
        let search = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM {table} WHERE {predicate} ORDER BY business_name LIMIT $4 OFFSET $5"
        );
        let data = sqlx::query_as::<_, Partner>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, kind: PartnerKind, p: &Partner) -> AppResult<Partner> {
        let sql = format!(
            r#"
            UPDATE {table}
            SET business_name = $2, tax_id = $3, contact_name = $4, phone = $5, email = $6,
                address = $7, status = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {PARTNER_COLUMNS}
            "#,
            table = kind.table()
        );
        sqlx::query_as::<_, Partner>(&sql)
            .bind(p.id)
            .bind(&p.business_name)
            .bind(&p.tax_id)
            .bind(&p.contact_name)
            .bind(&p.phone)
            .bind(&p.email)
            .bind(&p.address)
            .bind(p.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &duplicate_partner(kind)))
    }

    async fn delete(&self, kind: PartnerKind, id: Uuid) -> AppResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
//  ROTAS
// =============================================================================

const ROUTE_COLUMNS: &str = "id, operator_id, name, code, origin, destination, distance, \
                             estimated_duration, status, created_at, updated_at";
const DUPLICATE_ROUTE: &str = "Já existe uma rota com esse nome ou código.";

#[derive(Clone)]
pub struct PgRouteRepository {
    pool: PgPool,
}

impl PgRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteRepository for PgRouteRepository {
    async fn create(&self, r: Route) -> AppResult<Route> {
        let sql = format!(
            r#"
            INSERT INTO routes (id, operator_id, name, code, origin, destination, distance, estimated_duration, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ROUTE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Route>(&sql)
            .bind(r.id)
            .bind(r.operator_id)
            .bind(&r.name)
            .bind(&r.code)
            .bind(&r.origin)
            .bind(&r.destination)
            .bind(r.distance)
            .bind(r.estimated_duration)
            .bind(r.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_ROUTE))
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Route>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, Route>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Route>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE operator_id = $1 AND name = $2"
        );
        Ok(sqlx::query_as::<_, Route>(&sql)
            .bind(operator_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_code(&self, operator_id: Uuid, code: &str) -> AppResult<Option<Route>> {
        let sql = format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE operator_id = $1 AND code = $2");
        Ok(sqlx::query_as::<_, Route>(&sql)
            .bind(operator_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Route>> {
        let predicate = format!(
            "{SCOPE_FILTER} AND ($3::text IS NULL OR name ILIKE $3 OR code ILIKE $3 OR origin ILIKE $3 OR destination ILIKE $3)"
        );
        let search = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM routes WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE {predicate} ORDER BY name LIMIT $4 OFFSET $5"
        );
        let data = sqlx::query_as::<_, Route>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, r: &Route) -> AppResult<Route> {
        let sql = format!(
            r#"
            UPDATE routes
            SET name = $2, code = $3, origin = $4, destination = $5, distance = $6,
                estimated_duration = $7, status = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {ROUTE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Route>(&sql)
            .bind(r.id)
            .bind(&r.name)
            .bind(&r.code)
            .bind(&r.origin)
            .bind(&r.destination)
            .bind(r.distance)
            .bind(r.estimated_duration)
            .bind(r.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_ROUTE))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
