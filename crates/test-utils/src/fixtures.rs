//! Common test fixtures for the map client tests.
//!
//! This module provides canned service responses and bounds that represent
//! the services the client talks to.

/// Common bounds as (west, south, east, north).
pub mod bbox {
    /// Whole globe in degrees
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Web Mercator usable range in degrees
    pub const MERCATOR_DEGREES: (f64, f64, f64, f64) = (-180.0, -85.0, 180.0, 85.0);

    /// Germany, entirely north-east of the meridian
    pub const GERMANY: (f64, f64, f64, f64) = (5.5, 47.0, 15.5, 55.5);

    /// Europe, straddles the meridian with a 30/70 split
    pub const EUROPE: (f64, f64, f64, f64) = (-30.0, 30.0, 70.0, 75.0);
}

/// Common time values for testing.
pub mod time {
    /// A fixed reference time for tests (2024-01-15T12:00:00Z)
    pub const REFERENCE_TIME: &str = "2024-01-15T12:00:00Z";

    /// The same instant in the compact REST form
    pub const REFERENCE_TIME_COMPACT: &str = "20240115.120000";

    /// A newer compact timestamp, 30 minutes later
    pub const LATER_TIME_COMPACT: &str = "20240115.123000";
}

/// Common CRS identifiers.
pub mod crs {
    pub const EPSG_4326: &str = "EPSG:4326";
    pub const EPSG_3857: &str = "EPSG:3857";
    pub const CRS_84: &str = "CRS:84";
}

/// GetCapabilities documents.
pub mod capabilities {
    /// Two queryable layers under a non-queryable root, in the style of a
    /// geoserver behind EUMETSAT View.
    ///
    /// - `msg_fes:ir108`: EPSG:4326 bounds (latitude first), 15 minute
    ///   time dimension, one legend with a width
    /// - `dwd:RADOLAN`: EPSG:3857 bounds, no time dimension
    pub const EUMETSAT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms" xmlns:xlink="http://www.w3.org/1999/xlink">
  <Service>
    <Name>WMS</Name>
    <Title>EUMETView</Title>
  </Service>
  <Capability>
    <Layer>
      <Title>EUMETSAT layers</Title>
      <CRS>EPSG:4326</CRS>
      <Layer queryable="1" opaque="0">
        <Name>msg_fes:ir108</Name>
        <Title>MSG IR 10.8</Title>
        <Abstract>Infrared imagery&#13;&#10;full earth scan</Abstract>
        <KeywordList>
          <Keyword>infrared</Keyword>
        </KeywordList>
        <CRS>EPSG:4326</CRS>
        <CRS>EPSG:3857</CRS>
        <EX_GeographicBoundingBox>
          <westBoundLongitude>-77.0</westBoundLongitude>
          <eastBoundLongitude>77.0</eastBoundLongitude>
          <southBoundLatitude>-81.0</southBoundLatitude>
          <northBoundLatitude>81.0</northBoundLatitude>
        </EX_GeographicBoundingBox>
        <BoundingBox CRS="EPSG:4326" minx="-81.0" miny="-77.0" maxx="81.0" maxy="77.0"/>
        <BoundingBox CRS="EPSG:3857" minx="-8571600" miny="-16429700" maxx="8571600" maxy="16429700"/>
        <Dimension name="time" default="current" units="ISO8601">2024-01-14T12:00:00Z/2024-01-15T12:00:00Z/PT15M</Dimension>
        <Attribution>
          <Title>EUMETSAT</Title>
        </Attribution>
        <Style>
          <Name>default</Name>
          <Title>Default style</Title>
          <LegendURL width="180" height="40">
            <Format>image/png</Format>
            <OnlineResource xlink:type="simple" xlink:href="https://view.eumetsat.int/geoserver/ows?service=WMS&amp;request=GetLegendGraphic&amp;layer=msg_fes:ir108"/>
          </LegendURL>
        </Style>
      </Layer>
      <Layer queryable="1">
        <Name>dwd:RADOLAN</Name>
        <Title>Radar composite</Title>
        <BoundingBox CRS="EPSG:3857" minx="-20037508.342789244" miny="-20037508.342789244" maxx="20037508.342789244" maxy="20037508.342789244"/>
        <CRS>EPSG:3857</CRS>
      </Layer>
      <Layer>
        <Name>background</Name>
        <Title>Not queryable</Title>
        <CRS>EPSG:4326</CRS>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>
"#;

    /// A layer whose only reference system is not supported.
    pub const UNSUPPORTED_CRS: &str = r#"<WMS_Capabilities version="1.3.0">
  <Capability>
    <Layer queryable="1">
      <Name>dwd:Warnungen</Name>
      <CRS>EPSG:31467</CRS>
    </Layer>
  </Capability>
</WMS_Capabilities>
"#;

    /// Cut off in the middle of the second layer.
    pub const TRUNCATED: &str = r#"<WMS_Capabilities version="1.3.0">
  <Capability>
    <Layer>
      <Layer queryable="1">
        <Name>first</Name>
        <CRS>CRS:84</CRS>
      </Layer>
      <Layer queryable="1">
        <Name>second</Name>
        <CRS>CRS:84"#;
}

/// REST/JSON responses.
pub mod rest {
    /// api/products: one displayable product, one that is not png24.
    pub const PRODUCTS: &str = r#"[
  {
    "id": "globalir",
    "dataid": "globalir",
    "name": "Global Infrared",
    "description": "Global IR composite",
    "type": "image",
    "outputtype": "png24",
    "seedlatbound": 85,
    "times": ["20240115.113000", "20240115.120000"]
  },
  {
    "id": "nexrad-h",
    "name": "NEXRAD Hourly",
    "outputtype": "png",
    "times": []
  }
]"#;

    /// api/extents for globalir, numbers as strings.
    pub const EXTENTS: &str = r#"{
  "globalir": {
    "north": "85", "south": "-85", "west": "-180", "east": "180",
    "width": "4096", "height": "2048"
  }
}"#;

    /// api/latest with the timestamp already listed in PRODUCTS.
    pub const LATEST_KNOWN: &str = r#"{"globalir": "20240115.120000"}"#;

    /// api/latest with a new timestamp.
    pub const LATEST_NEW: &str = r#"{"globalir": "20240115.123000"}"#;
}
