// fsrtool - GPS track log to flight simulator video converter
// Copyright (C) 2017  Datong Sun (dndx@idndx.com)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Simulator property dictionary and the typed values stored in frames.

use error::{Error, Result};
use std::fmt;

/// Wire id of a property value type
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ValueType {
    Bool = 1,
    Double = 2,
    Int = 3,
    String = 4,
}

impl ValueType {
    pub fn from_u16(id: u16) -> Option<ValueType> {
        match id {
            1 => Some(ValueType::Bool),
            2 => Some(ValueType::Double),
            3 => Some(ValueType::Int),
            4 => Some(ValueType::String),
            _ => None,
        }
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn zero(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Double => Value::Double(0_f64),
            ValueType::Int => Value::Int(0),
            ValueType::String => Value::Str(String::new()),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    Bool(bool),
    Double(f64),
    Int(i32),
    Str(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match *self {
            Value::Bool(_) => ValueType::Bool,
            Value::Double(_) => ValueType::Double,
            Value::Int(_) => ValueType::Int,
            Value::Str(_) => ValueType::String,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(d) => Some(d),
            Value::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    /// Decode the textual form used by the XML encoding
    pub fn parse(t: ValueType, s: &str) -> Result<Value> {
        let bad = || Error::invalid(format!("invalid {:?} value '{}'", t, s));

        Ok(match t {
            ValueType::Bool => {
                if s.eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else {
                    return Err(bad());
                }
            }
            ValueType::Double => Value::Double(parse_double(s).ok_or_else(bad)?),
            ValueType::Int => Value::Int(s.trim().parse().map_err(|_| bad())?),
            ValueType::String => Value::Str(s.to_string()),
        })
    }
}

/// Textual form used by the XML encoding, parsed back by `Value::parse`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Double(d) => f.write_str(&format_double(d)),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(ref s) => f.write_str(s),
        }
    }
}

/// Shortest decimal string that parses back to the same bits. NaN keeps its
/// payload as hex since there is no decimal spelling for it.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        format!("NaN(0x{:016X})", d.to_bits())
    } else {
        format!("{}", d)
    }
}

pub fn parse_double(s: &str) -> Option<f64> {
    let s = s.trim();

    if s.starts_with("NaN(0x") && s.ends_with(')') {
        return u64::from_str_radix(&s[6..s.len() - 1], 16)
            .ok()
            .map(f64::from_bits);
    }

    s.parse().ok()
}

/// Simulator objects that own properties
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ObjectId {
    UserAircraft = 4096,
    Environment = 8192,
}

impl ObjectId {
    pub const ALL: [ObjectId; 2] = [ObjectId::UserAircraft, ObjectId::Environment];

    pub fn id(self) -> u16 {
        self as u16
    }

    /// Name the host expects in the object definition section
    pub fn name(self) -> &'static str {
        match self {
            ObjectId::UserAircraft => "UserAircraft",
            // the host only accepts this spelling
            ObjectId::Environment => "Enviroment",
        }
    }
}

/// Ids of the trailer data items
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum DataItemId {
    Name = 1,
    Description = 2,
}

impl DataItemId {
    pub fn id(self) -> u16 {
        self as u16
    }
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum PropertyId {
    PlaneLatitude = 1,
    PlaneLongitude,
    PlaneAltitude,
    PlanePitchDegrees,
    PlaneBankDegrees,
    PlaneHeadingDegreesTrue,
    SimOnGround,
    VelocityWorldX,
    VelocityWorldY,
    VelocityWorldZ,
    IndicatedAltitude,
    AirspeedIndicated,
    PlaneHeadingDegreesMagnetic,
    GForce,
    GeneralEng1ThrottleLeverPosition,
    GeneralEng2ThrottleLeverPosition,
    GeneralEng3ThrottleLeverPosition,
    GeneralEng4ThrottleLeverPosition,
    GeneralEng1MixtureLeverPosition,
    GeneralEng2MixtureLeverPosition,
    GeneralEng3MixtureLeverPosition,
    GeneralEng4MixtureLeverPosition,
    GeneralEng1PropellerLeverPosition,
    GeneralEng2PropellerLeverPosition,
    GeneralEng3PropellerLeverPosition,
    GeneralEng4PropellerLeverPosition,
    AutopilotMaster,
    YokeYPosition,
    YokeXPosition,
    RudderPedalPosition,
    ElevatorPosition,
    AileronPosition,
    RudderPosition,
    FlapsHandleIndex,
    SpoilersHandlePosition,
    GearHandlePosition,
    WaterRudderHandlePosition,
    ConcordeVisorNoseHandle,
    LightStates,
    AbsoluteTime,
    TimeZoneOffset,
}

impl PropertyId {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(PartialEq, Debug, Copy, Clone)]
pub struct PropertyDetail {
    pub object: ObjectId,
    /// `None` marks an id that is not defined
    pub value_type: Option<ValueType>,
    pub unit: &'static str,
    pub name: &'static str,
}

impl PropertyDetail {
    pub fn is_defined(&self) -> bool {
        self.value_type.is_some()
    }
}

const fn aircraft(value_type: ValueType, unit: &'static str, name: &'static str) -> PropertyDetail {
    PropertyDetail {
        object: ObjectId::UserAircraft,
        value_type: Some(value_type),
        unit,
        name,
    }
}

const fn environment(value_type: ValueType, unit: &'static str, name: &'static str) -> PropertyDetail {
    PropertyDetail {
        object: ObjectId::Environment,
        value_type: Some(value_type),
        unit,
        name,
    }
}

const UNDEFINED: PropertyDetail = PropertyDetail {
    object: ObjectId::UserAircraft,
    value_type: None,
    unit: "",
    name: "",
};

use self::ValueType::{Bool, Double, Int};

static FS2002_PROPERTIES: [PropertyDetail; 42] = [
    UNDEFINED,
    aircraft(Double, "degrees", "PLANE LATITUDE"),
    aircraft(Double, "degrees", "PLANE LONGITUDE"),
    aircraft(Double, "ft", "PLANE ALTITUDE"),
    aircraft(Double, "degrees", "PLANE PITCH DEGREES"),
    aircraft(Double, "degrees", "PLANE BANK DEGREES"),
    aircraft(Double, "degrees", "PLANE HEADING DEGREES TRUE"),
    aircraft(Bool, "Enum", "SIM ON GROUND"),
    aircraft(Double, "meters/second", "VELOCITY WORLD X"),
    aircraft(Double, "meters/second", "VELOCITY WORLD Y"),
    aircraft(Double, "meters/second", "VELOCITY WORLD Z"),
    aircraft(Double, "ft", "INDICATED ALTITUDE"),
    aircraft(Double, "knot", "AIRSPEED INDICATED"),
    aircraft(Double, "degrees", "PLANE HEADING DEGREES MAGNETIC"),
    aircraft(Double, "GForce", "G FORCE"),
    aircraft(Double, "percent", "GENERAL ENG1 THROTTLE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG2 THROTTLE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG3 THROTTLE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG4 THROTTLE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG1 MIXTURE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG2 MIXTURE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG3 MIXTURE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG4 MIXTURE LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG1 PROPELLER LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG2 PROPELLER LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG3 PROPELLER LEVER POSITION"),
    aircraft(Double, "percent", "GENERAL ENG4 PROPELLER LEVER POSITION"),
    aircraft(Bool, "Enum", "AUTOPILOT MASTER"),
    aircraft(Double, "percent", "YOKE Y POSITION"),
    aircraft(Double, "percent", "YOKE X POSITION"),
    aircraft(Double, "percent", "RUDDER PEDAL POSITION"),
    aircraft(Double, "percent", "ELEVATOR POSITION"),
    aircraft(Double, "percent", "AILERON POSITION"),
    aircraft(Double, "percent", "RUDDER POSITION"),
    aircraft(Int, "numbers", "FLAPS HANDLE INDEX"),
    aircraft(Double, "position", "SPOILERS HANDLE POSITION"),
    aircraft(Double, "position", "GEAR HANDLE POSITION"),
    aircraft(Double, "position", "WATER RUDDER HANDLE POSITION"),
    aircraft(Int, "position", "CONCORDE VISOR NOSE HANDLE"),
    aircraft(Int, "mask", "LIGHT STATES"),
    environment(Double, "second", "ABSOLUTE TIME"),
    environment(Double, "second", "TIME ZONE OFFSET"),
];

/// Read-only table of simulator properties, indexed by property id
#[derive(Debug, Copy, Clone)]
pub struct PropertyDictionary {
    details: &'static [PropertyDetail],
}

impl PropertyDictionary {
    /// Properties understood by the FS2002 video recorder
    pub fn fs2002() -> Self {
        PropertyDictionary {
            details: &FS2002_PROPERTIES,
        }
    }

    /// Number of slots, including undefined ids
    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn get(&self, id: usize) -> Option<&'static PropertyDetail> {
        self.details.get(id).filter(|d| d.is_defined())
    }

    /// Defined properties in id order
    pub fn defined(&self) -> impl Iterator<Item = (u16, &'static PropertyDetail)> {
        self.details
            .iter()
            .enumerate()
            .filter(|&(_, d)| d.is_defined())
            .map(|(i, d)| (i as u16, d))
    }
}

/// One value slot per dictionary id, plus a flag telling whether the slot
/// has been written since construction. Undefined ids hold a placeholder.
#[derive(Debug, Clone)]
pub struct PropertyValues {
    values: Vec<Value>,
    defined: Vec<bool>,
    written: Vec<bool>,
}

impl PropertyValues {
    pub fn new(dict: &PropertyDictionary) -> Self {
        let types: Vec<Option<ValueType>> = (0..dict.len())
            .map(|i| dict.get(i).and_then(|d| d.value_type))
            .collect();

        PropertyValues {
            values: types
                .iter()
                .map(|t| t.unwrap_or(ValueType::Bool).zero())
                .collect(),
            defined: types.iter().map(|t| t.is_some()).collect(),
            written: vec![false; dict.len()],
        }
    }

    pub fn get(&self, id: PropertyId) -> &Value {
        &self.values[id.index()]
    }

    pub fn slot(&self, index: usize) -> Option<&Value> {
        match self.defined.get(index) {
            Some(&true) => Some(&self.values[index]),
            _ => None,
        }
    }

    pub fn f64(&self, id: PropertyId) -> f64 {
        self.get(id).as_f64().unwrap_or(0_f64)
    }

    pub fn set(&mut self, id: PropertyId, v: Value) {
        self.set_slot(id.index(), v);
    }

    pub fn set_slot(&mut self, index: usize, v: Value) {
        if let Some(&true) = self.defined.get(index) {
            debug_assert_eq!(self.values[index].value_type(), v.value_type());
            self.values[index] = v;
            self.written[index] = true;
        }
    }

    pub fn is_written(&self, id: PropertyId) -> bool {
        self.written[id.index()]
    }
}
