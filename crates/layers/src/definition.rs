use serde::{Deserialize, Serialize};

use crate::layer::{GeometryKind, LayerKey};
use crate::symbology::{ClassScheme, LayerStyle};

/// Naming variants of the watershed join code across dataset vendors.
pub const CODE_FIELDS: &[&str] = &["Cod_man", "COD_MAN", "cod_man", "codman"];
pub const ORIGIN_FIELDS: &[&str] = &["Classe", "CLASSE"];
pub const MANANCIAL_FIELDS: &[&str] = &["Manancial", "MANANCIAL"];
pub const BASIN_NAME_FIELDS: &[&str] = &["Nome_bacia", "NOME_BACIA"];
pub const REGION_FIELDS: &[&str] = &["RegIdr", "REGIDR", "regidr", "REG_IDR", "CRegIdr"];
pub const MUNICIPALITY_FIELDS: &[&str] = &[
    "Municipio",
    "MUNICIPIO",
    "municipio",
    "municipio_",
    "NM_MUN",
    "NM_MUNIC",
];

fn default_join_fields() -> Vec<String> {
    CODE_FIELDS.iter().map(|f| f.to_string()).collect()
}

/// Class attribute of a layer: candidate fields, tried in order, and the
/// scheme that colors and orders the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub fields: Vec<String>,
    pub scheme: ClassScheme,
}

impl Classification {
    pub fn new(fields: &[&str], scheme: ClassScheme) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            scheme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub key: LayerKey,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub files: Vec<String>,
    #[serde(default = "default_join_fields")]
    pub join_fields: Vec<String>,
    #[serde(default)]
    pub classification: Option<Classification>,
    /// Attribute identifying a feature within its layer, when the data has one.
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub initially_visible: bool,
    #[serde(default)]
    pub style: LayerStyle,
    #[serde(default)]
    pub legend_title: Option<String>,
    /// Label of the single entry of an unclassified legend.
    #[serde(default)]
    pub total_label: Option<String>,
}

impl LayerDefinition {
    pub fn new(key: &str, name: &str, kind: GeometryKind, files: &[&str]) -> Self {
        Self {
            key: LayerKey::new(key),
            name: name.to_string(),
            kind,
            files: files.iter().map(|f| f.to_string()).collect(),
            join_fields: default_join_fields(),
            classification: None,
            id_field: None,
            initially_visible: false,
            style: LayerStyle::default(),
            legend_title: None,
            total_label: None,
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_legend(mut self, title: Option<&str>, total_label: Option<&str>) -> Self {
        self.legend_title = title.map(str::to_string);
        self.total_label = total_label.map(str::to_string);
        self
    }

    pub fn with_join_fields(mut self, fields: &[&str]) -> Self {
        self.join_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_id_field(mut self, field: &str) -> Self {
        self.id_field = Some(field.to_string());
        self
    }

    pub fn visible_at_start(mut self) -> Self {
        self.initially_visible = true;
        self
    }

    pub fn legend_title(&self) -> &str {
        self.legend_title.as_deref().unwrap_or(&self.name)
    }

    pub fn total_label(&self) -> &str {
        if let Some(label) = self.total_label.as_deref() {
            return label;
        }
        match self.kind {
            GeometryKind::Polygon => "Área filtrada",
            GeometryKind::Line => "Extensão filtrada",
            GeometryKind::Point => "Total de registros",
        }
    }
}

/// The set of layers a session works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCatalog {
    /// Watershed layer; its codes are the selection universe.
    pub base_layer: LayerKey,
    /// Point layer whose attributes add regions and municipalities to the
    /// watershed records.
    #[serde(default)]
    pub enrichment_layer: Option<LayerKey>,
    pub layers: Vec<LayerDefinition>,
}

impl Default for DatasetCatalog {
    fn default() -> Self {
        Self::agua_segura()
    }
}

impl DatasetCatalog {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, key: &str) -> Option<&LayerDefinition> {
        self.layers.iter().find(|d| d.key.as_str() == key)
    }

    /// The published Água Segura datasets.
    pub fn agua_segura() -> Self {
        use GeometryKind::{Line, Point, Polygon};

        let layers = vec![
            LayerDefinition::new(
                "microbacias",
                "Microbacias",
                Polygon,
                &["otto_selec__ottos_selec_lista4.geojson.gz"],
            )
            .with_style(LayerStyle::filled("#1e3a8a", 1.6, "#93c5fd", 0.25))
            .visible_at_start(),
            LayerDefinition::new(
                "declividade",
                "Declividade",
                Polygon,
                &["declividade__declividade_otto.geojson.gz"],
            )
            .with_classification(Classification::new(&["ClDec"], ClassScheme::slope()))
            .with_style(LayerStyle::outline("#4b5563", 0.4, 0.6))
            .with_legend(Some("Declividade (%)"), None),
            LayerDefinition::new(
                "altimetria",
                "Altimetria",
                Polygon,
                &["altimetria__altimetria_otto.geojson.gz"],
            )
            .with_classification(Classification::new(&["ClAlt"], ClassScheme::elevation()))
            .with_style(LayerStyle::outline("#4b5563", 0.4, 0.6))
            .with_legend(Some("Altimetria (m)"), None),
            LayerDefinition::new(
                "uso_solo",
                "Uso do Solo",
                Polygon,
                &["uso_solo__usodosolo_otto.geojson.gz"],
            )
            .with_classification(Classification::new(
                &["NIVEL_II", "NIVEL_I"],
                ClassScheme::land_use(),
            ))
            .with_style(LayerStyle::outline("#374151", 0.3, 0.55)),
            LayerDefinition::new("solos", "Solos", Polygon, &["solos__solos_otto.geojson.gz"])
                .with_classification(Classification::new(&["Cl_solos"], ClassScheme::soils()))
                .with_style(LayerStyle::outline("#475569", 0.4, 0.6)),
            LayerDefinition::new(
                "estradas",
                "Estradas",
                Line,
                &["estradas__estradas_otto.geojson.gz"],
            )
            .with_style(LayerStyle::line("#737373", 2.0).with_dash("4,4")),
            LayerDefinition::new(
                "hidrografia",
                "Hidrografia",
                Line,
                &["hidrografia__hidrografia_otto.geojson.gz"],
            )
            .with_style(LayerStyle::line("#2b8cbe", 2.0)),
            LayerDefinition::new(
                "nascentes",
                "Nascentes",
                Point,
                &["nascentes__nascentes_otto.geojson.gz"],
            )
            .with_style(LayerStyle::marker("#0f766e"))
            .with_legend(None, Some("Total de nascentes")),
            LayerDefinition::new(
                "construcoes",
                "Construções",
                Point,
                &[
                    "construcoes__construcoes_otto__part1.geojson.gz",
                    "construcoes__construcoes_otto__part2.geojson.gz",
                    "construcoes__construcoes_otto__part3.geojson.gz",
                    "construcoes__construcoes_otto__part4.geojson.gz",
                    "construcoes__construcoes_otto__part5.geojson.gz",
                ],
            )
            .with_style(LayerStyle::marker("#1f2937")),
            LayerDefinition::new("caf", "CAF", Point, &["caf__caf_otto.geojson.gz"])
                .with_style(LayerStyle::marker("#16a34a"))
                .with_legend(None, Some("Total de registros CAF")),
            LayerDefinition::new("car", "CAR", Polygon, &["car__car_otto.geojson"])
                .with_style(LayerStyle::filled("#ea580c", 1.2, "#fb923c", 0.2))
                .with_id_field("cod_imovel"),
        ];

        Self {
            base_layer: LayerKey::new("microbacias"),
            enrichment_layer: Some(LayerKey::new("caf")),
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_catalog_covers_every_dataset() {
        let catalog = DatasetCatalog::default();
        let keys: Vec<&str> = catalog.layers.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "microbacias",
                "declividade",
                "altimetria",
                "uso_solo",
                "solos",
                "estradas",
                "hidrografia",
                "nascentes",
                "construcoes",
                "caf",
                "car",
            ]
        );
        assert!(catalog.get(catalog.base_layer.as_str()).is_some());
        assert_eq!(catalog.get("construcoes").map(|d| d.files.len()), Some(5));
        assert_eq!(
            catalog.get("uso_solo").and_then(|d| d.classification.as_ref()).map(|c| c.fields.clone()),
            Some(vec!["NIVEL_II".to_string(), "NIVEL_I".to_string()])
        );
    }

    #[test]
    fn legend_texts_fall_back_by_kind() {
        let catalog = DatasetCatalog::default();
        let slope = catalog.get("declividade").unwrap();
        assert_eq!(slope.legend_title(), "Declividade (%)");
        let roads = catalog.get("estradas").unwrap();
        assert_eq!(roads.legend_title(), "Estradas");
        assert_eq!(roads.total_label(), "Extensão filtrada");
        assert_eq!(catalog.get("nascentes").unwrap().total_label(), "Total de nascentes");
        assert_eq!(catalog.get("construcoes").unwrap().total_label(), "Total de registros");
    }

    #[test]
    fn catalog_reads_from_json_with_defaults() {
        let json = r#"{
            "base_layer": "bacias",
            "layers": [
                {"key": "bacias", "name": "Bacias", "type": "poly", "files": ["b.geojson"]},
                {
                    "key": "classes",
                    "name": "Classes",
                    "type": "polygon",
                    "files": ["c1.geojson.gz", "c2.geojson.gz"],
                    "classification": {
                        "fields": ["CLS"],
                        "scheme": {"order": "nominal", "palettes": []}
                    }
                }
            ]
        }"#;
        let catalog = DatasetCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.enrichment_layer, None);
        let bacias = catalog.get("bacias").unwrap();
        assert_eq!(bacias.kind, GeometryKind::Polygon);
        assert_eq!(bacias.join_fields, default_join_fields());
        assert!(!bacias.initially_visible);
        assert_eq!(bacias.style, LayerStyle::default());
        assert!(catalog.get("classes").unwrap().classification.is_some());
    }

    #[test]
    fn default_catalog_survives_a_json_round_trip() {
        let catalog = DatasetCatalog::agua_segura();
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(DatasetCatalog::from_json_str(&json).unwrap(), catalog);
    }
}
