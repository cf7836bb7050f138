use std::{
    io,
    sync::{Arc, Mutex},
};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    async_connection_wrapper::AsyncConnectionWrapper,
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use mlwh_schema::{pac_bio_product_metrics, pac_bio_run, pac_bio_run_well_metrics};
use rstest::fixture;
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner},
};
use tokio::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

use crate::db::{TimeWindow, Write, error};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../db/migrations");

pub fn timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// The calendar year 2021, which contains every seeded row except those on
/// or outside its bounds
pub fn window_2021() -> TimeWindow {
    TimeWindow::new(
        timestamp("2021-01-01 00:00:00"),
        timestamp("2022-01-01 00:00:00"),
    )
}

/// One sequenced library: a `pac_bio_run` row, the run well metrics of its
/// well (shared with other libraries in the same well) and its product
/// metrics.
pub struct SeedProduct {
    pub run_name: &'static str,
    pub well_label: &'static str,
    pub tag_identifier: Option<&'static str>,
    pub tag_sequence: Option<&'static str>,
    pub tag2_sequence: Option<&'static str>,
    pub recorded_at: &'static str,
    pub rw_product_id: Option<&'static str>,
}

pub const SEED_PRODUCTS: [SeedProduct; 7] = [
    SeedProduct {
        run_name: "81230",
        well_label: "B1",
        tag_identifier: Some("bc1020"),
        tag_sequence: Some("CACACGCGCGCTATATT"),
        tag2_sequence: None,
        recorded_at: "2021-04-05 12:00:00",
        rw_product_id: None,
    },
    SeedProduct {
        run_name: "81876",
        well_label: "A1",
        tag_identifier: None,
        tag_sequence: None,
        tag2_sequence: None,
        recorded_at: "2021-06-01 09:30:00",
        rw_product_id: Some("fb76b33a8beb37f0da6da9577c67ea5d0c654121997cc195b9e83c0834d69e58"),
    },
    SeedProduct {
        run_name: "83472",
        well_label: "A1",
        tag_identifier: Some("bc1001"),
        tag_sequence: Some("CACATATCAGAGTGCG"),
        tag2_sequence: None,
        recorded_at: "2021-09-10 16:45:00",
        rw_product_id: None,
    },
    SeedProduct {
        run_name: "83472",
        well_label: "A1",
        tag_identifier: Some("bc1002"),
        tag_sequence: Some("GTGTCTACATGACTGT"),
        tag2_sequence: Some("ACGTCATCGTAGTCAG"),
        recorded_at: "2021-09-10 16:45:00",
        rw_product_id: None,
    },
    SeedProduct {
        run_name: "80000",
        well_label: "E1",
        tag_identifier: None,
        tag_sequence: None,
        tag2_sequence: None,
        recorded_at: "2021-01-01 00:00:00",
        rw_product_id: None,
    },
    SeedProduct {
        run_name: "90011",
        well_label: "D1",
        tag_identifier: Some("bc1008"),
        tag_sequence: Some("TTTTAAAA"),
        tag2_sequence: None,
        recorded_at: "2022-01-01 00:00:00",
        rw_product_id: None,
    },
    SeedProduct {
        run_name: "79103",
        well_label: "C1",
        tag_identifier: None,
        tag_sequence: None,
        tag2_sequence: None,
        recorded_at: "2020-11-20 08:15:00",
        rw_product_id: None,
    },
];

impl Write for &SeedProduct {
    type Returns = ();

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        let recorded_at = timestamp(self.recorded_at);

        let run_id: i32 = diesel::insert_into(pac_bio_run::table)
            .values((
                pac_bio_run::id_lims.eq("Traction"),
                pac_bio_run::id_pac_bio_run_lims.eq(self.run_name),
                pac_bio_run::pac_bio_run_name.eq(self.run_name),
                pac_bio_run::well_label.eq(self.well_label),
                pac_bio_run::tag_identifier.eq(self.tag_identifier),
                pac_bio_run::tag_sequence.eq(self.tag_sequence),
                pac_bio_run::tag2_sequence.eq(self.tag2_sequence),
                pac_bio_run::recorded_at.eq(recorded_at),
                pac_bio_run::last_updated.eq(recorded_at),
            ))
            .returning(pac_bio_run::id_pac_bio_tmp)
            .get_result(db_conn)
            .await?;

        let existing_rw_id: Option<i32> = pac_bio_run_well_metrics::table
            .filter(pac_bio_run_well_metrics::pac_bio_run_name.eq(self.run_name))
            .filter(pac_bio_run_well_metrics::well_label.eq(self.well_label))
            .select(pac_bio_run_well_metrics::id_pac_bio_rw_metrics_tmp)
            .first(db_conn)
            .await
            .optional()?;

        let rw_id = match existing_rw_id {
            Some(id) => id,
            None => {
                diesel::insert_into(pac_bio_run_well_metrics::table)
                    .values((
                        pac_bio_run_well_metrics::pac_bio_run_name.eq(self.run_name),
                        pac_bio_run_well_metrics::well_label.eq(self.well_label),
                        pac_bio_run_well_metrics::instrument_type.eq("Sequel2e"),
                        pac_bio_run_well_metrics::id_pac_bio_product.eq(self.rw_product_id),
                    ))
                    .returning(pac_bio_run_well_metrics::id_pac_bio_rw_metrics_tmp)
                    .get_result(db_conn)
                    .await?
            }
        };

        diesel::insert_into(pac_bio_product_metrics::table)
            .values((
                pac_bio_product_metrics::id_pac_bio_rw_metrics_tmp.eq(rw_id),
                pac_bio_product_metrics::id_pac_bio_tmp.eq(run_id),
            ))
            .execute(db_conn)
            .await?;

        Ok(())
    }
}

struct TestState {
    _container: ContainerAsync<Postgres>,
    host: String,
    port: u16,
}

impl TestState {
    async fn new() -> Self {
        let container = Postgres::default()
            .with_host_auth()
            .with_tag("17-alpine")
            .start()
            .await
            .unwrap();

        let host = container.get_host().await.unwrap().to_string();
        let port = container.get_host_port_ipv4(5432).await.unwrap();

        Self {
            _container: container,
            host,
            port,
        }
    }

    fn db_url(&self, db_name: &str) -> String {
        let Self { host, port, .. } = self;

        format!("postgres://postgres@{host}:{port}/{db_name}")
    }
}

static TEST_STATE: OnceCell<TestState> = OnceCell::const_new();

async fn run_migrations(db_url: String) {
    tokio::task::spawn_blocking(move || {
        let mut conn =
            <AsyncConnectionWrapper<AsyncPgConnection> as diesel::Connection>::establish(&db_url)
                .unwrap();
        conn.run_pending_migrations(MIGRATIONS).unwrap();
    })
    .await
    .unwrap();
}

/// Creates a new database inside the shared container, migrates it and
/// seeds it with [`SEED_PRODUCTS`]. Every caller gets its own database so
/// tests that write never see each other's updates.
pub async fn seeded_db_conn() -> AsyncPgConnection {
    let test_state = TEST_STATE.get_or_init(TestState::new).await;

    let db_name = format!("mlwh_{}", Uuid::now_v7().simple());

    let mut root_conn = AsyncPgConnection::establish(&test_state.db_url("postgres"))
        .await
        .unwrap();
    diesel::sql_query(format!("create database {db_name}"))
        .execute(&mut root_conn)
        .await
        .unwrap();

    let db_url = test_state.db_url(&db_name);
    run_migrations(db_url.clone()).await;

    let mut db_conn = AsyncPgConnection::establish(&db_url).await.unwrap();
    for product in &SEED_PRODUCTS {
        product.write(&mut db_conn).await.unwrap();
    }

    db_conn
}

#[fixture]
pub async fn db_conn() -> AsyncPgConnection {
    seeded_db_conn().await
}

/// Gives the run well metrics row of `run_name` a product id, as another
/// writer would
pub async fn assign_well_product_id(
    run_name: &str,
    product_id: &str,
    db_conn: &mut AsyncPgConnection,
) {
    diesel::update(
        pac_bio_run_well_metrics::table
            .filter(pac_bio_run_well_metrics::pac_bio_run_name.eq(run_name)),
    )
    .set(pac_bio_run_well_metrics::id_pac_bio_product.eq(product_id))
    .execute(db_conn)
    .await
    .unwrap();
}

/// An in-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.0.lock().unwrap();

        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MakeWriter<'_> for LogBuffer {
    type Writer = Self;

    fn make_writer(&self) -> Self::Writer {
        self.clone()
    }
}
