//! Table template registry: what a complete tenant schema looks like.
//!
//! Every template body is a self-contained `CREATE TABLE IF NOT EXISTS {table}`
//! statement; `{table}` is replaced with `<tenant>_<suffix>` at render time.
//! Changing a body here is itself a schema change and should ship with a
//! fan-out migration for existing tenants.

use serde::Serialize;

use crate::db::ident::{sanitize, TenantId};

/// Bump whenever a template body changes.
pub const REGISTRY_VERSION: u32 = 1;

/// Token substituted with the sanitized tenant id in migration statements.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Older spelling of the same token, still accepted in migration statements.
pub const LEGACY_TENANT_PLACEHOLDER: &str = "{isletme_id}";

/// Replace every tenant placeholder in `statement` with `tenant`.
pub fn substitute_tenant(statement: &str, tenant: &TenantId) -> String {
    statement
        .replace(TENANT_PLACEHOLDER, tenant.as_str())
        .replace(LEGACY_TENANT_PLACEHOLDER, tenant.as_str())
}

const TABLE_PLACEHOLDER: &str = "{table}";

#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub suffix: String,
    pub body: String,
}

impl TemplateSpec {
    pub fn new(suffix: &str, body: &str) -> Self {
        Self {
            suffix: sanitize(suffix),
            body: body.to_owned(),
        }
    }
}

/// Default key/value rows inserted into a freshly created settings table.
#[derive(Debug, Clone)]
pub struct SettingsSeed {
    pub suffix: String,
    pub key_column: String,
    pub value_column: String,
    pub defaults: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableTemplate {
    pub name: String,
    pub suffix: String,
    pub definition: String,
}

/// A rendered seed: one parameterised insert run once per default pair.
#[derive(Debug, Clone)]
pub struct SeedPlan<'a> {
    pub table: String,
    pub statement: String,
    pub rows: &'a [(String, String)],
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    version: u32,
    specs: Vec<TemplateSpec>,
    seed: Option<SettingsSeed>,
}

impl TemplateRegistry {
    pub fn new(version: u32, specs: Vec<TemplateSpec>, seed: Option<SettingsSeed>) -> Self {
        let mut unique: Vec<TemplateSpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            if let Some(existing) = unique.iter_mut().find(|s| s.suffix == spec.suffix) {
                tracing::warn!("duplicate template suffix {}, keeping the last one", spec.suffix);
                *existing = spec;
            } else {
                unique.push(spec);
            }
        }
        Self {
            version,
            specs: unique,
            seed,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Suffixes in registry order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.suffix.as_str())
    }

    pub fn templates(&self, tenant: &TenantId) -> Vec<TableTemplate> {
        self.specs.iter().map(|s| render(tenant, s)).collect()
    }

    pub fn template_for(&self, tenant: &TenantId, suffix: &str) -> Option<TableTemplate> {
        self.specs
            .iter()
            .find(|s| s.suffix == suffix)
            .map(|s| render(tenant, s))
    }

    pub fn settings_suffix(&self) -> Option<&str> {
        self.seed.as_ref().map(|s| s.suffix.as_str())
    }

    pub fn seed_plan(&self, tenant: &TenantId) -> Option<SeedPlan<'_>> {
        let seed = self.seed.as_ref()?;
        let table = tenant.table(&seed.suffix);
        let key = sanitize(&seed.key_column);
        let value = sanitize(&seed.value_column);
        Some(SeedPlan {
            statement: format!(
                "INSERT INTO {table} ({key}, {value}) VALUES ($1, $2) ON CONFLICT ({key}) DO NOTHING"
            ),
            table,
            rows: &seed.defaults,
        })
    }

    /// The nine-table business schema.
    pub fn standard() -> Self {
        let specs = vec![
            TemplateSpec::new("randevular", APPOINTMENTS),
            TemplateSpec::new("musteriler", CUSTOMERS),
            TemplateSpec::new("hizmetler", SERVICES),
            TemplateSpec::new("odemeler", PAYMENTS),
            TemplateSpec::new("faturalar", INVOICES),
            TemplateSpec::new("bildirimler", NOTIFICATIONS),
            TemplateSpec::new("anketler", SURVEYS),
            TemplateSpec::new("mesajlar", MESSAGES),
            TemplateSpec::new("ayarlar", SETTINGS),
        ];
        let seed = SettingsSeed {
            suffix: "ayarlar".into(),
            key_column: "ayar_adi".into(),
            value_column: "ayar_degeri".into(),
            defaults: DEFAULT_SETTINGS
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        };
        Self::new(REGISTRY_VERSION, specs, Some(seed))
    }
}

fn render(tenant: &TenantId, spec: &TemplateSpec) -> TableTemplate {
    let name = tenant.table(&spec.suffix);
    TableTemplate {
        definition: spec.body.replace(TABLE_PLACEHOLDER, &name),
        name,
        suffix: spec.suffix.clone(),
    }
}

const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("calisma_baslangic", "09:00"),
    ("calisma_bitis", "20:00"),
    ("randevu_araligi_dk", "30"),
    ("otomatik_hatirlatma", "true"),
    ("hatirlatma_saat_once", "2"),
    ("anket_aktif", "true"),
    ("anket_saat_sonra", "2"),
    ("konum_gonder", "true"),
    ("dil", "tr"),
    ("tema", "midnight"),
    ("para_birimi", "TRY"),
    ("kdv_orani", "20"),
    ("logo_url", ""),
    ("isletme_adresi", ""),
    ("isletme_telefon", ""),
    ("google_maps_link", ""),
];

// --- Appointments ---
const APPOINTMENTS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id                    SERIAL PRIMARY KEY,
    musteri_id            INTEGER,
    musteri_adi           VARCHAR(200) NOT NULL,
    telefon_no            VARCHAR(20),
    islem_turu            VARCHAR(200),
    hizmet_id             INTEGER,
    uzman                 VARCHAR(100),
    uzman_id              INTEGER,
    baslangic_saati       TIMESTAMP NOT NULL,
    bitis_saati           TIMESTAMP NOT NULL,
    durum                 VARCHAR(20) DEFAULT 'bekliyor',
    odeme_durumu          VARCHAR(20) DEFAULT 'odenmedi',
    odeme_tutari          DECIMAL(10,2),
    odeme_yontemi         VARCHAR(50),
    kaynak                VARCHAR(20) DEFAULT 'manuel',
    notlar                TEXT,
    iptal_nedeni          TEXT,
    hatirlatma_gonderildi BOOLEAN DEFAULT FALSE,
    anket_gonderildi      BOOLEAN DEFAULT FALSE,
    created_at            TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at            TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Customers ---
const CUSTOMERS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id             SERIAL PRIMARY KEY,
    ad_soyad       VARCHAR(200) NOT NULL,
    telefon        VARCHAR(20) UNIQUE,
    email          VARCHAR(200),
    dogum_tarihi   DATE,
    cinsiyet       VARCHAR(10),
    adres          TEXT,
    notlar         TEXT,
    etiketler      TEXT[],
    toplam_randevu INTEGER DEFAULT 0,
    toplam_harcama DECIMAL(10,2) DEFAULT 0,
    son_ziyaret    TIMESTAMP,
    kaynak         VARCHAR(50) DEFAULT 'manuel',
    created_at     TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at     TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Services ---
const SERVICES: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id          SERIAL PRIMARY KEY,
    hizmet_adi  VARCHAR(200) NOT NULL,
    kategori    VARCHAR(100),
    sure_dakika INTEGER NOT NULL DEFAULT 60,
    fiyat       DECIMAL(10,2) NOT NULL DEFAULT 0,
    para_birimi VARCHAR(10) DEFAULT 'TRY',
    aciklama    TEXT,
    renk        VARCHAR(20),
    sira        INTEGER DEFAULT 0,
    is_active   BOOLEAN DEFAULT TRUE,
    created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Payments ---
const PAYMENTS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id            SERIAL PRIMARY KEY,
    randevu_id    INTEGER,
    musteri_id    INTEGER,
    tutar         DECIMAL(10,2) NOT NULL,
    para_birimi   VARCHAR(10) DEFAULT 'TRY',
    odeme_yontemi VARCHAR(50) NOT NULL,
    durum         VARCHAR(20) DEFAULT 'tamamlandi',
    aciklama      TEXT,
    created_at    TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Invoices ---
const INVOICES: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id                 SERIAL PRIMARY KEY,
    fatura_no          VARCHAR(50),
    randevu_id         INTEGER,
    musteri_id         INTEGER,
    fatura_turu        VARCHAR(20) DEFAULT 'e_arsiv',
    ara_toplam         DECIMAL(10,2),
    kdv_orani          DECIMAL(5,2) DEFAULT 20,
    kdv_tutari         DECIMAL(10,2),
    toplam_tutar       DECIMAL(10,2),
    durum              VARCHAR(20) DEFAULT 'bekliyor',
    provider_fatura_id VARCHAR(100),
    provider_response  JSONB,
    created_at         TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Notifications ---
const NOTIFICATIONS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id            SERIAL PRIMARY KEY,
    randevu_id    INTEGER,
    musteri_id    INTEGER,
    bildirim_tipi VARCHAR(50) NOT NULL,
    kanal         VARCHAR(20) DEFAULT 'whatsapp',
    icerik        TEXT,
    durum         VARCHAR(20) DEFAULT 'gonderildi',
    hata_mesaji   TEXT,
    created_at    TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Surveys ---
const SURVEYS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id         SERIAL PRIMARY KEY,
    randevu_id INTEGER,
    musteri_id INTEGER,
    puan       INTEGER CHECK (puan >= 1 AND puan <= 5),
    yorum      TEXT,
    uzman_id   INTEGER,
    hizmet_id  INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Messages ---
const MESSAGES: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id                SERIAL PRIMARY KEY,
    musteri_id        INTEGER,
    telefon           VARCHAR(20),
    yon               VARCHAR(10) NOT NULL,
    mesaj_tipi        VARCHAR(50),
    icerik            TEXT,
    durum             VARCHAR(20) DEFAULT 'gonderildi',
    provider          VARCHAR(50),
    provider_mesaj_id VARCHAR(200),
    created_at        TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

// --- Settings (key/value) ---
const SETTINGS: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id          SERIAL PRIMARY KEY,
    ayar_adi    VARCHAR(100) UNIQUE NOT NULL,
    ayar_degeri TEXT,
    created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;
