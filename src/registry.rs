use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::{ColorModel, HsvBounds};
use crate::{validate_model_name, ActuatorIndex, Hsv};

/// Raw model record as it appears in configuration.
///
/// Channel values are kept wide here so that out-of-range and wrong-arity
/// input can be reported against the model name instead of failing inside
/// the deserializer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowerhsv: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upperhsv: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hue_wrap: bool,
    /// Sampled HSV points; bounds are derived instead of given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<Vec<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_bgr: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jet_number: Option<i64>,
}

impl ModelDescriptor {
    /// Validate the record and build a model from it.
    pub fn to_model(&self) -> Result<ColorModel> {
        self.build().with_context(|| format!("model '{}'", self.name))
    }

    fn build(&self) -> Result<ColorModel> {
        validate_model_name(&self.name)?;

        let bounds = match (&self.lowerhsv, &self.upperhsv, &self.samples) {
            (Some(lower), Some(upper), None) => {
                if self.padding.is_some() {
                    return Err(anyhow!("padding only applies to samples"));
                }
                let lower = triple("lowerhsv", lower)?;
                let upper = triple("upperhsv", upper)?;
                HsvBounds::new(Hsv::from(lower), Hsv::from(upper), self.hue_wrap)?
            }
            (None, None, Some(samples)) => {
                if self.hue_wrap {
                    return Err(anyhow!("hue_wrap cannot be combined with samples"));
                }
                let points = samples
                    .iter()
                    .enumerate()
                    .map(|(i, s)| triple(&format!("samples[{}]", i), s).map(Hsv::from))
                    .collect::<Result<Vec<_>>>()?;
                let padding = channel("padding", self.padding.unwrap_or(0))?;
                HsvBounds::from_samples(&points, padding)?
            }
            (_, _, Some(_)) => {
                return Err(anyhow!("give either lowerhsv/upperhsv or samples, not both"))
            }
            (None, _, None) => return Err(anyhow!("missing lowerhsv")),
            (_, None, None) => return Err(anyhow!("missing upperhsv")),
        };

        let display_bgr = match &self.display_bgr {
            Some(bgr) => triple("display_bgr", bgr)?,
            None => return Err(anyhow!("missing display_bgr")),
        };
        let jet = match self.jet_number {
            Some(jet) => ActuatorIndex::try_from(jet)
                .map_err(|_| anyhow!("jet_number {} is not a valid actuator index", jet))?,
            None => return Err(anyhow!("missing jet_number")),
        };

        Ok(ColorModel::new(&self.name, bounds, display_bgr, jet))
    }
}

fn channel(field: &str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{}={} out of range 0..=255", field, value))
}

fn triple(field: &str, values: &[i64]) -> Result<[u8; 3]> {
    if values.len() != 3 {
        return Err(anyhow!(
            "{} must have 3 components, got {}",
            field,
            values.len()
        ));
    }
    let mut out = [0u8; 3];
    for (i, value) in values.iter().enumerate() {
        out[i] = channel(&format!("{}[{}]", field, i), *value)?;
    }
    Ok(out)
}

/// Ordered, immutable set of color models.
///
/// Order is significant: it is the tie-break order used by the arbiter.
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    models: Vec<ColorModel>,
}

impl ModelRegistry {
    /// Validate every descriptor. Any failure rejects the whole registry.
    pub fn load(descriptors: &[ModelDescriptor]) -> Result<Self> {
        let models = descriptors
            .iter()
            .map(ModelDescriptor::to_model)
            .collect::<Result<Vec<_>>>()?;
        Self::from_models(models)
    }

    pub fn from_models(models: Vec<ColorModel>) -> Result<Self> {
        if models.is_empty() {
            return Err(anyhow!("at least one color model is required"));
        }
        let mut seen = HashSet::new();
        for model in &models {
            validate_model_name(&model.name).with_context(|| format!("model '{}'", model.name))?;
            if !seen.insert(model.name.as_str()) {
                return Err(anyhow!("model '{}': duplicate name", model.name));
            }
        }
        Ok(Self { models })
    }

    pub fn models(&self) -> &[ColorModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColorModel> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Position of a model in tie-break order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name == name)
    }

    /// Jet indices referenced by any model, ascending, deduplicated.
    pub fn jets(&self) -> Vec<ActuatorIndex> {
        let mut jets: Vec<_> = self.models.iter().map(|m| m.jet).collect();
        jets.sort_unstable();
        jets.dedup();
        jets
    }
}
