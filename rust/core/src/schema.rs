// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC type catalog
//!
//! Maps entity type codes to their canonical STEP names and back. Codes are
//! the CRC-32 of the upper-case entity name, so they line up with the codes
//! other IFC toolkits use (IFCWALL = 2391406946).

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::parser::is_step_keyword;
use crate::token::MAX_SHORT_STRING;

/// Type-code to canonical-name lookup consumed by the model and export driver
pub trait TypeCatalog {
    /// Canonical (upper-case) name for a code
    fn name_of(&self, code: u32) -> Option<&str>;

    /// Code for a name as it appears in a STEP file
    fn code_of(&self, name: &str) -> Option<u32>;
}

macro_rules! ifc_types {
    ($($variant:ident = $name:literal => $code:literal,)*) => {
        /// IFC Entity Types
        /// Common IFC4 types known without registration
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum IfcType {
            $($variant,)*
        }

        impl IfcType {
            /// Every built-in type
            pub const ALL: &'static [IfcType] = &[$(IfcType::$variant,)*];

            /// Parse IFC type from its upper-case STEP name
            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Get string representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Numeric type code
            pub fn code(&self) -> u32 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

ifc_types! {
    IfcWall = "IFCWALL" => 2391406946,
    IfcWallStandardCase = "IFCWALLSTANDARDCASE" => 3512223829,
    IfcSlab = "IFCSLAB" => 1529196076,
    IfcBeam = "IFCBEAM" => 753842376,
    IfcColumn = "IFCCOLUMN" => 843113511,
    IfcRoof = "IFCROOF" => 2016517767,
    IfcStair = "IFCSTAIR" => 331165859,
    IfcRailing = "IFCRAILING" => 2262370178,
    IfcCurtainWall = "IFCCURTAINWALL" => 3495092785,
    IfcPlate = "IFCPLATE" => 3171933400,
    IfcMember = "IFCMEMBER" => 1073191201,
    IfcDoor = "IFCDOOR" => 395920057,
    IfcWindow = "IFCWINDOW" => 3304561284,
    IfcOpeningElement = "IFCOPENINGELEMENT" => 3588315303,
    IfcSpace = "IFCSPACE" => 3856911033,
    IfcBuildingStorey = "IFCBUILDINGSTOREY" => 3124254112,
    IfcBuilding = "IFCBUILDING" => 4031249490,
    IfcSite = "IFCSITE" => 4097777520,
    IfcProject = "IFCPROJECT" => 103090709,
    IfcRelAggregates = "IFCRELAGGREGATES" => 160246688,
    IfcRelContainedInSpatialStructure = "IFCRELCONTAINEDINSPATIALSTRUCTURE" => 3242617779,
    IfcRelDefinesByProperties = "IFCRELDEFINESBYPROPERTIES" => 4186316022,
    IfcRelAssociatesMaterial = "IFCRELASSOCIATESMATERIAL" => 2655215786,
    IfcRelVoidsElement = "IFCRELVOIDSELEMENT" => 1401173127,
    IfcRelFillsElement = "IFCRELFILLSELEMENT" => 3940055652,
    IfcPropertySet = "IFCPROPERTYSET" => 1451395588,
    IfcPropertySingleValue = "IFCPROPERTYSINGLEVALUE" => 3650150729,
    IfcPropertyEnumeratedValue = "IFCPROPERTYENUMERATEDVALUE" => 4166981789,
    IfcElementQuantity = "IFCELEMENTQUANTITY" => 1883228015,
    IfcMaterial = "IFCMATERIAL" => 1838606355,
    IfcMaterialLayer = "IFCMATERIALLAYER" => 248100487,
    IfcMaterialLayerSet = "IFCMATERIALLAYERSET" => 3303938423,
    IfcMaterialLayerSetUsage = "IFCMATERIALLAYERSETUSAGE" => 1303795690,
    IfcShapeRepresentation = "IFCSHAPEREPRESENTATION" => 4240577450,
    IfcProductDefinitionShape = "IFCPRODUCTDEFINITIONSHAPE" => 673634403,
    IfcExtrudedAreaSolid = "IFCEXTRUDEDAREASOLID" => 477187591,
    IfcAxis2Placement3D = "IFCAXIS2PLACEMENT3D" => 2740243338,
    IfcAxis2Placement2D = "IFCAXIS2PLACEMENT2D" => 3125803723,
    IfcLocalPlacement = "IFCLOCALPLACEMENT" => 2624227202,
    IfcCartesianPoint = "IFCCARTESIANPOINT" => 1123145078,
    IfcDirection = "IFCDIRECTION" => 32440307,
    IfcPolyline = "IFCPOLYLINE" => 3724593414,
    IfcArbitraryClosedProfileDef = "IFCARBITRARYCLOSEDPROFILEDEF" => 3798115385,
    IfcArbitraryProfileDefWithVoids = "IFCARBITRARYPROFILEDEFWITHVOIDS" => 2705031697,
    IfcRectangleProfileDef = "IFCRECTANGLEPROFILEDEF" => 3615266464,
    IfcCircleProfileDef = "IFCCIRCLEPROFILEDEF" => 1383045692,
    IfcIShapeProfileDef = "IFCISHAPEPROFILEDEF" => 1484403080,
    IfcLShapeProfileDef = "IFCLSHAPEPROFILEDEF" => 572779678,
    IfcUShapeProfileDef = "IFCUSHAPEPROFILEDEF" => 427810014,
    IfcTShapeProfileDef = "IFCTSHAPEPROFILEDEF" => 3071757647,
    IfcCShapeProfileDef = "IFCCSHAPEPROFILEDEF" => 2898889636,
    IfcZShapeProfileDef = "IFCZSHAPEPROFILEDEF" => 2543172580,
    IfcCircleHollowProfileDef = "IFCCIRCLEHOLLOWPROFILEDEF" => 2937912522,
    IfcIndexedPolyCurve = "IFCINDEXEDPOLYCURVE" => 2571569899,
    IfcCompositeCurve = "IFCCOMPOSITECURVE" => 3732776249,
    IfcCompositeCurveSegment = "IFCCOMPOSITECURVESEGMENT" => 2485617015,
    IfcTrimmedCurve = "IFCTRIMMEDCURVE" => 3593883385,
    IfcCircle = "IFCCIRCLE" => 2611217952,
    IfcEllipse = "IFCELLIPSE" => 1704287377,
    IfcLine = "IFCLINE" => 1281925730,
    IfcCartesianPointList2D = "IFCCARTESIANPOINTLIST2D" => 1675464909,
    IfcCartesianPointList3D = "IFCCARTESIANPOINTLIST3D" => 2059837836,
    IfcPipeSegment = "IFCPIPESEGMENT" => 3612865200,
    IfcDuctSegment = "IFCDUCTSEGMENT" => 3518393246,
    IfcCableSegment = "IFCCABLESEGMENT" => 4217484030,
    IfcFurnishingElement = "IFCFURNISHINGELEMENT" => 263784265,
    IfcFurniture = "IFCFURNITURE" => 1509553395,
    IfcAnnotation = "IFCANNOTATION" => 1674181508,
    IfcGrid = "IFCGRID" => 3009204131,
    IfcOwnerHistory = "IFCOWNERHISTORY" => 1207048766,
    IfcPerson = "IFCPERSON" => 2077209135,
    IfcOrganization = "IFCORGANIZATION" => 4251960020,
    IfcApplication = "IFCAPPLICATION" => 639542469,
    IfcBuildingElementProxy = "IFCBUILDINGELEMENTPROXY" => 1095909175,
    IfcQuantityLength = "IFCQUANTITYLENGTH" => 931644368,
    IfcQuantityArea = "IFCQUANTITYAREA" => 2044713172,
    IfcQuantityVolume = "IFCQUANTITYVOLUME" => 2405470396,
    IfcSIUnit = "IFCSIUNIT" => 448429030,
    IfcUnitAssignment = "IFCUNITASSIGNMENT" => 180925521,
    IfcGeometricRepresentationContext = "IFCGEOMETRICREPRESENTATIONCONTEXT" => 3448662350,
    IfcPolyLoop = "IFCPOLYLOOP" => 2924175390,
    IfcFace = "IFCFACE" => 2556980723,
    IfcFaceOuterBound = "IFCFACEOUTERBOUND" => 803316827,
    IfcClosedShell = "IFCCLOSEDSHELL" => 2205249479,
    IfcFacetedBrep = "IFCFACETEDBREP" => 807026263,
    IfcTriangulatedFaceSet = "IFCTRIANGULATEDFACESET" => 2916149573,
    IfcPolygonalFaceSet = "IFCPOLYGONALFACESET" => 2839578677,
    IfcMappedItem = "IFCMAPPEDITEM" => 2347385850,
    IfcRepresentationMap = "IFCREPRESENTATIONMAP" => 1660063152,
    IfcBooleanClippingResult = "IFCBOOLEANCLIPPINGRESULT" => 3649129432,
    IfcStyledItem = "IFCSTYLEDITEM" => 3958052878,
    IfcSurfaceStyle = "IFCSURFACESTYLE" => 1300840506,
    IfcColourRgb = "IFCCOLOURRGB" => 776857604,
    IfcRelDefinesByType = "IFCRELDEFINESBYTYPE" => 781010003,
    IfcWallType = "IFCWALLTYPE" => 1898987631,
    IfcDoorType = "IFCDOORTYPE" => 2323601079,
    IfcWindowType = "IFCWINDOWTYPE" => 4009809668,
    IfcPersonAndOrganization = "IFCPERSONANDORGANIZATION" => 101040310,
}

impl fmt::Display for IfcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog of the built-in [`IfcType`]s plus any registered extras
#[derive(Debug, Default, Clone)]
pub struct IfcSchema {
    names: FxHashMap<u32, Box<str>>,
    codes: FxHashMap<Box<str>, u32>,
}

impl IfcSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extra entity type.
    ///
    /// Re-registering the same pair is a no-op. A code or name already bound
    /// to something else is rejected.
    pub fn register(&mut self, name: &str, code: u32) -> Result<()> {
        let name = name.to_ascii_uppercase();
        if !is_step_keyword(&name) || name.len() > MAX_SHORT_STRING {
            return Err(Error::unsupported(format!(
                "type name must be a 1..={} byte STEP keyword, got {} bytes",
                MAX_SHORT_STRING,
                name.len()
            )));
        }

        let existing_name = self.name_of(code).map(str::to_owned);
        let existing_code = self.code_of(&name);
        match (existing_name, existing_code) {
            (Some(existing), _) if existing != name => Err(Error::unsupported(format!(
                "type code {} already names {}",
                code, existing
            ))),
            (_, Some(existing)) if existing != code => Err(Error::unsupported(format!(
                "type {} already has code {}",
                name, existing
            ))),
            (Some(_), Some(_)) => Ok(()),
            _ => {
                self.codes.insert(name.clone().into_boxed_str(), code);
                self.names.insert(code, name.into_boxed_str());
                Ok(())
            }
        }
    }

    /// Number of registered extras
    pub fn extra_count(&self) -> usize {
        self.names.len()
    }
}

impl TypeCatalog for IfcSchema {
    fn name_of(&self, code: u32) -> Option<&str> {
        IfcType::from_code(code)
            .map(|t| t.as_str())
            .or_else(|| self.names.get(&code).map(|name| &**name))
    }

    fn code_of(&self, name: &str) -> Option<u32> {
        let lookup = |name: &str| {
            IfcType::from_str(name)
                .map(|t| t.code())
                .or_else(|| self.codes.get(name).copied())
        };
        lookup(name).or_else(|| {
            if name.bytes().any(|b| b.is_ascii_lowercase()) {
                lookup(&name.to_ascii_uppercase())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(IfcType::from_str("IFCWALL"), Some(IfcType::IfcWall));
        assert_eq!(IfcType::from_str("IFCDOOR"), Some(IfcType::IfcDoor));
        assert_eq!(IfcType::from_str("IFCCUSTOMTYPE"), None);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(IfcType::IfcWall.as_str(), "IFCWALL");
        assert_eq!(IfcType::IfcDoor.to_string(), "IFCDOOR");
    }

    #[test]
    fn test_codes_are_unique_and_reversible() {
        let mut seen = rustc_hash::FxHashSet::default();
        for ty in IfcType::ALL {
            assert!(seen.insert(ty.code()), "duplicate code for {}", ty);
            assert_eq!(IfcType::from_code(ty.code()), Some(*ty));
        }
        assert_eq!(IfcType::IfcWall.code(), 2391406946);
        assert_eq!(IfcType::IfcProject.code(), 103090709);
    }

    #[test]
    fn test_schema_catalog() {
        let schema = IfcSchema::new();
        assert_eq!(schema.name_of(2391406946), Some("IFCWALL"));
        assert_eq!(schema.code_of("IFCWALL"), Some(2391406946));
        assert_eq!(schema.code_of("IfcWall"), Some(2391406946));
        assert_eq!(schema.name_of(7), None);
        assert_eq!(schema.code_of("IFCNOPE"), None);
    }

    #[test]
    fn test_register_extra_type() {
        let mut schema = IfcSchema::new();
        schema.register("IfcCustomThing", 77).unwrap();
        assert_eq!(schema.name_of(77), Some("IFCCUSTOMTHING"));
        assert_eq!(schema.code_of("IFCCUSTOMTHING"), Some(77));

        // Same pair again is fine
        schema.register("IFCCUSTOMTHING", 77).unwrap();
        assert_eq!(schema.extra_count(), 1);

        assert!(schema.register("IFCOTHER", 77).is_err());
        assert!(schema.register("IFCCUSTOMTHING", 78).is_err());
        assert!(schema.register("IFCWALL", 1).is_err());
        assert!(schema.register("", 5).is_err());
        assert!(schema.register("IFC CUSTOM", 6).is_err());
        assert_eq!(schema.name_of(6), None);
    }
}
