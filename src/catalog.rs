use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;

/// Feature
///
/// The closed catalogue of amenity tags a listing can carry. The wire ids are the
/// ones stored in the `listings.features` text array, so renaming a variant's
/// serde id is a data migration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub enum Feature {
    #[serde(rename = "piscina")]
    Piscina,
    #[serde(rename = "garagem")]
    Garagem,
    #[serde(rename = "jardim")]
    Jardim,
    #[serde(rename = "varanda")]
    Varanda,
    #[serde(rename = "terraço")]
    Terraco,
    #[serde(rename = "elevador")]
    Elevador,
    #[serde(rename = "ar_condicionado")]
    ArCondicionado,
    #[serde(rename = "aquecimento")]
    Aquecimento,
    #[serde(rename = "lareira")]
    Lareira,
    #[serde(rename = "churrasqueira")]
    Churrasqueira,
    #[serde(rename = "arrecadacao")]
    Arrecadacao,
    #[serde(rename = "despensa")]
    Despensa,
    #[serde(rename = "suite")]
    Suite,
    #[serde(rename = "closet")]
    Closet,
    #[serde(rename = "escritorio")]
    Escritorio,
    #[serde(rename = "ginasio")]
    Ginasio,
    #[serde(rename = "sauna")]
    Sauna,
    #[serde(rename = "jacuzzi")]
    Jacuzzi,
    #[serde(rename = "condominio_fechado")]
    CondominioFechado,
    #[serde(rename = "portaria_24h")]
    Portaria24h,
    #[serde(rename = "video_vigilancia")]
    VideoVigilancia,
    #[serde(rename = "alarme")]
    Alarme,
    #[serde(rename = "paineis_solares")]
    PaineisSolares,
    #[serde(rename = "vidros_duplos")]
    VidrosDuplos,
    #[serde(rename = "cozinha_equipada")]
    CozinhaEquipada,
    #[serde(rename = "mobilado")]
    Mobilado,
    #[serde(rename = "vista_mar")]
    VistaMar,
    #[serde(rename = "vista_montanha")]
    VistaMontanha,
    #[serde(rename = "pet_friendly")]
    PetFriendly,
    #[serde(rename = "acessibilidade")]
    Acessibilidade,
}

/// (variant, wire id, display label) in catalogue order.
const CATALOGUE: [(Feature, &str, &str); 30] = [
    (Feature::Piscina, "piscina", "Piscina"),
    (Feature::Garagem, "garagem", "Garagem"),
    (Feature::Jardim, "jardim", "Jardim"),
    (Feature::Varanda, "varanda", "Varanda"),
    (Feature::Terraco, "terraço", "Terraço"),
    (Feature::Elevador, "elevador", "Elevador"),
    (Feature::ArCondicionado, "ar_condicionado", "Ar Condicionado"),
    (Feature::Aquecimento, "aquecimento", "Aquecimento Central"),
    (Feature::Lareira, "lareira", "Lareira"),
    (Feature::Churrasqueira, "churrasqueira", "Churrasqueira"),
    (Feature::Arrecadacao, "arrecadacao", "Arrecadação"),
    (Feature::Despensa, "despensa", "Despensa"),
    (Feature::Suite, "suite", "Suite"),
    (Feature::Closet, "closet", "Closet"),
    (Feature::Escritorio, "escritorio", "Escritório"),
    (Feature::Ginasio, "ginasio", "Ginásio"),
    (Feature::Sauna, "sauna", "Sauna"),
    (Feature::Jacuzzi, "jacuzzi", "Jacuzzi"),
    (Feature::CondominioFechado, "condominio_fechado", "Condomínio Fechado"),
    (Feature::Portaria24h, "portaria_24h", "Portaria 24h"),
    (Feature::VideoVigilancia, "video_vigilancia", "Vídeo Vigilância"),
    (Feature::Alarme, "alarme", "Sistema de Alarme"),
    (Feature::PaineisSolares, "paineis_solares", "Painéis Solares"),
    (Feature::VidrosDuplos, "vidros_duplos", "Vidros Duplos"),
    (Feature::CozinhaEquipada, "cozinha_equipada", "Cozinha Equipada"),
    (Feature::Mobilado, "mobilado", "Mobilado"),
    (Feature::VistaMar, "vista_mar", "Vista Mar"),
    (Feature::VistaMontanha, "vista_montanha", "Vista Montanha"),
    (Feature::PetFriendly, "pet_friendly", "Pet Friendly"),
    (Feature::Acessibilidade, "acessibilidade", "Acessibilidade"),
];

impl Feature {
    pub fn all() -> impl Iterator<Item = Feature> {
        CATALOGUE.iter().map(|(feature, _, _)| *feature)
    }

    pub fn id(self) -> &'static str {
        CATALOGUE
            .iter()
            .find(|(feature, _, _)| *feature == self)
            .map(|(_, id, _)| *id)
            .unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        CATALOGUE
            .iter()
            .find(|(feature, _, _)| *feature == self)
            .map(|(_, _, label)| *label)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature '{0}'")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATALOGUE
            .iter()
            .find(|(_, id, _)| *id == s)
            .map(|(feature, _, _)| *feature)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// FeatureSet
///
/// Order-independent set of features. Serialized as a JSON array in catalogue
/// order and decoded from the `text[]` column via `TryFrom<Vec<String>>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    /// Adds the feature if absent, removes it if present.
    pub fn toggle(&mut self, feature: Feature) {
        if !self.0.remove(&feature) {
            self.0.insert(feature);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    /// Wire ids, for binding into the `text[]` column.
    pub fn ids(&self) -> Vec<String> {
        self.0.iter().map(|f| f.id().to_string()).collect()
    }

    /// Parses a list of wire ids, rejecting anything outside the catalogue.
    /// Duplicates collapse.
    pub fn parse<I, S>(ids: I) -> Result<Self, UnknownFeature>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .map(|id| id.as_ref().trim().parse::<Feature>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(FeatureSet)
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        FeatureSet(iter.into_iter().collect())
    }
}

impl TryFrom<Vec<String>> for FeatureSet {
    type Error = UnknownFeature;

    fn try_from(ids: Vec<String>) -> Result<Self, Self::Error> {
        FeatureSet::parse(ids)
    }
}

/// FeatureInfo
///
/// Catalogue entry served to clients building the feature picker.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FeatureInfo {
    pub id: Feature,
    pub label: String,
}

pub fn catalogue() -> Vec<FeatureInfo> {
    CATALOGUE
        .iter()
        .map(|(feature, _, label)| FeatureInfo {
            id: *feature,
            label: label.to_string(),
        })
        .collect()
}
