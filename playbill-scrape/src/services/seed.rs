//! Default company seed
//!
//! Creates the known companies with one enabled HTML source each, named after the
//! site's host so the registry resolves the matching site collector. Safe to run
//! repeatedly: existing companies (by slug) and sources (by URL) are kept.

use playbill_common::db::{NewCompany, SourceKind};
use playbill_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use url::Url;

use crate::db::{companies, sources};

/// Company known at install time
#[derive(Debug, Clone, Copy)]
pub struct SeedCompany {
    pub name: &'static str,
    pub website: &'static str,
    pub city: &'static str,
    pub region: &'static str,
    pub country: &'static str,
}

pub const DEFAULT_COMPANIES: [SeedCompany; 6] = [
    SeedCompany {
        name: "Alabama Shakespeare Festival",
        website: "https://asf.net",
        city: "Montgomery",
        region: "AL",
        country: "US",
    },
    SeedCompany {
        name: "American Shakespeare Center",
        website: "https://americanshakespearecenter.com",
        city: "Staunton",
        region: "VA",
        country: "US",
    },
    SeedCompany {
        name: "Oregon Shakespeare Festival",
        website: "https://osfashland.org",
        city: "Ashland",
        region: "OR",
        country: "US",
    },
    SeedCompany {
        name: "Shakespeare Theatre Company",
        website: "https://shakespearetheatre.org",
        city: "Washington",
        region: "DC",
        country: "US",
    },
    SeedCompany {
        name: "Utah Shakespeare Festival",
        website: "https://bard.org",
        city: "Cedar City",
        region: "UT",
        country: "US",
    },
    SeedCompany {
        name: "Guthrie Theater",
        website: "https://www.guthrietheater.org",
        city: "Minneapolis",
        region: "MN",
        country: "US",
    },
];

/// Rows created by one seed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub companies_created: usize,
    pub sources_created: usize,
}

/// Seed [`DEFAULT_COMPANIES`]
pub async fn seed_default_companies(pool: &SqlitePool) -> Result<SeedReport> {
    seed_companies(pool, &DEFAULT_COMPANIES).await
}

/// Ensure each company exists with an enabled HTML source at its website
pub async fn seed_companies(pool: &SqlitePool, seeds: &[SeedCompany]) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for seed in seeds {
        let host = Url::parse(seed.website)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| Error::InvalidInput(format!("Seed website has no host: {}", seed.website)))?;

        let (company, created) = companies::ensure_company(
            pool,
            &NewCompany {
                name: seed.name.to_string(),
                website: Some(seed.website.to_string()),
                city: Some(seed.city.to_string()),
                region: Some(seed.region.to_string()),
                country: Some(seed.country.to_string()),
            },
        )
        .await?;
        if created {
            report.companies_created += 1;
        }

        if sources::find_source(pool, company.guid, seed.website).await?.is_none() {
            sources::create_source(pool, company.guid, seed.website, SourceKind::Html, Some(&host)).await?;
            report.sources_created += 1;
        }
    }

    info!(
        companies_created = report.companies_created,
        sources_created = report.sources_created,
        "Seed complete"
    );
    Ok(report)
}
