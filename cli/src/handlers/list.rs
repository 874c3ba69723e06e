use std::fmt::Display;

use console::Style;
use fmha::backends::{common::Kernels, cpu::CpuKernels};
use serde::Serialize;

use super::Family;

#[derive(Serialize)]
struct FamilyListing {
    family: &'static str,
    count: usize,
    specializations: Vec<Specialization>,
}

#[derive(Serialize)]
struct Specialization {
    name: String,
    traits: serde_json::Value,
}

fn listing<'a, T: Display + Serialize + 'a>(
    family: Family,
    keys: impl Iterator<Item = &'a T>,
) -> Result<FamilyListing, serde_json::Error> {
    let mut specializations = keys
        .map(|traits| {
            Ok(Specialization {
                name: traits.to_string(),
                traits: serde_json::to_value(traits)?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    specializations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(FamilyListing {
        family: family.name(),
        count: specializations.len(),
        specializations,
    })
}

pub fn handle_list(
    family: Option<Family>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let kernels = CpuKernels::shared()?;
    let families = match family {
        Some(family) => vec![family],
        None => Family::ALL.to_vec(),
    };

    let listings = families
        .into_iter()
        .map(|family| match family {
            Family::Forward => listing(family, kernels.forward().keys()),
            Family::SplitKv => listing(family, kernels.split_kv().keys()),
            Family::BatchPrefill => listing(family, kernels.batch_prefill().keys()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    let style_header = Style::new().bold();
    for listing in listings {
        println!("{}", style_header.apply_to(format!("{}: {} specializations", listing.family, listing.count)));
        for specialization in listing.specializations {
            println!("{}", specialization.name);
        }
    }
    Ok(())
}
