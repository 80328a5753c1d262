// crates/kiwiglider-core/src/metadata/defaults.rs

// Default configuration sections derived from a deployment record.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::VariableSpec;
use crate::dataset::{AttrValue, Attributes, DEFAULT_FILL_VALUE, FILL_VALUE_ATTR};
use crate::error::Result;
use crate::metadata::record::DeploymentRecord;

const BLANK: &str = " ";
const TIME_UNITS: &str = "seconds since 1970-01-01T00:00:00Z";
const DEPTH_AVERAGED_COMMENT: &str = "The depth-averaged current is an estimate of the net current \
measured while the glider is underwater. The value is calculated over the entire underwater \
segment, which may consist of 1 or more dives.";

const STATIC_METADATA: [(&str, &str); 16] = [
    ("Conventions", "CF-1.11"),
    ("Metadata_Conventions", "CF-1.11, Unidata Dataset Discovery v1.0"),
    ("contributor_role_vocabulary", "http://vocab.nerc.ac.uk/search_nvs/W08/"),
    ("comment", BLANK),
    ("creator_url", BLANK),
    ("format_version", "IOOS_Glider_NetCDF_v2.0.nc"),
    (
        "keywords",
        "Water-based Platforms > Uncrewed Vehicles > Subsurface > Seaglider, \
Oceans > Marine Sediments > Turbidity, Oceans > Ocean Chemistry > Oxygen, \
Oceans > Ocean Circulation > Turbulence, Oceans > Ocean Pressure > Water Pressure, \
Oceans > Ocean Temperature > Water Temperature, Oceans > Salinity/Density > Conductivity, \
Oceans > Salinity/Density > Density, Oceans > Salinity/Density > Salinity",
    ),
    ("keywords_vocabulary", "GCMD Science Keywords"),
    ("license", "This data may be redistributed and used without restriction"),
    ("metadata_link", BLANK),
    ("processing_level", "Data are provided as-is"),
    ("publisher_url", BLANK),
    ("references", BLANK),
    ("source", "Observational data from a profiling glider"),
    ("standard_name_vocabulary", "Standard Name Table (v85, 21 May 2024)"),
    (
        "summary",
        "This dataset contains physical oceanographic measurements of temperature, \
conductivity, salinity, density and estimates of depth-average currents.",
    ),
];

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn iso_midnight(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", ymd(date))
}

/// `GLD0007` for deployment 7.
pub fn deployment_name(id: i64) -> String {
    format!("GLD{id:04}")
}

/// Reverses the domain of an e-mail address: `a@niwa.co.nz` -> `nz.co.niwa`.
pub fn naming_authority(email: &str) -> String {
    let domain = email.rsplit('@').next().unwrap_or(email);
    domain.split('.').rev().collect::<Vec<_>>().join(".")
}

/// One role per comma-separated name in each contributor field.
fn contributor_roles(groups: &[(&str, &str)]) -> String {
    groups
        .iter()
        .flat_map(|(names, role)| std::iter::repeat(*role).take(names.matches(',').count() + 1))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn default_metadata(record: &DeploymentRecord) -> Result<Attributes> {
    let mut meta: Attributes = STATIC_METADATA
        .iter()
        .map(|(key, value)| (key.to_string(), AttrValue::from(*value)))
        .collect();

    let pi = record.text("principal_investigator")?;
    let dm = record.text("data_manager")?;
    let pilot = record.text("pilot")?;
    let email = record.text("data_manager_email")?;

    let mut put = |key: &str, value: String| {
        meta.insert(key.to_string(), AttrValue::Text(value));
    };

    put(
        "acknowledgement",
        format!("This work supported by funding from {}", record.text("funding")?),
    );
    put("contributor_name", [pi.as_str(), dm.as_str(), pilot.as_str()].join(","));
    put(
        "contributor_role",
        contributor_roles(&[
            (pi.as_str(), "Principal Investigator"),
            (dm.as_str(), "Data Manager"),
            (pilot.as_str(), "Operator"),
        ]),
    );
    put("creator_email", email.clone());
    put("creator_name", dm.clone());
    put("deployment_name", deployment_name(record.id()));
    put("deployment_start", ymd(record.date("deploy_date")?));
    put("deployment_end", ymd(record.date("end_date")?));
    put("glider_name", record.text("platform_id")?);
    put("glider_serial", record.text("platform_sn")?);
    put("glider_model", record.text("glidertype")?);
    put("glider_pump", format!("{}m", record.text("pump_type")?));
    put("institution", record.text("owner")?);
    put("naming_authority", naming_authority(&email));
    put("platform_type", record.text("platform_type")?);
    put("project", record.text("project_name")?);
    put("publisher_email", email);
    put("publisher_name", dm);
    put("sea_name", record.text("sea")?);
    put("wmo_id", record.text("wmo_id")?);

    Ok(meta)
}

fn text_attrs(pairs: &[(&str, String)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), AttrValue::Text(value.clone())))
        .collect()
}

/// Optional instruments: (device name, sheet prefix, make).
const OPTIONAL_DEVICES: [(&str, &str, &str); 6] = [
    ("optics", "wetlabs", "Wetlabs"),
    ("oxygen", "oxy", "AADI"),
    ("par", "par", "Biospherical"),
    ("optics2", "bb3", "SeaBird"),
    ("lisst", "lisst", "Sequoia"),
    ("microrider", "microrider", "Rockland"),
];

pub fn default_glider_devices(record: &DeploymentRecord) -> Result<BTreeMap<String, Attributes>> {
    let mut devices = BTreeMap::new();

    devices.insert(
        "pressure".to_string(),
        text_attrs(&[
            ("make", "Micron".to_string()),
            ("model", "Pressure".to_string()),
            ("serial", record.text("pres_sn")?),
        ]),
    );
    devices.insert(
        "ctd".to_string(),
        text_attrs(&[
            ("make", "Seabird".to_string()),
            ("model", record.text("ctd_type")?),
            ("serial", record.text("ctd_sn")?),
            ("long_name", "Seabird SlocumCTD".to_string()),
            ("make_model", "Seabird SlocumCTD".to_string()),
            ("factory_calibrated", BLANK.to_string()),
            ("calibration_date", ymd(record.date("ctd_cal")?)),
            ("calibration_report", BLANK.to_string()),
            ("comment", BLANK.to_string()),
        ]),
    );

    for (device, prefix, make) in OPTIONAL_DEVICES {
        if !record.flag(&format!("{prefix}_installed"))? {
            continue;
        }
        let calibrated = ymd(record.date(&format!("{prefix}_cal"))?);
        devices.insert(
            device.to_string(),
            text_attrs(&[
                ("make", make.to_string()),
                ("model", record.text(&format!("{prefix}_type"))?),
                ("serial", record.text(&format!("{prefix}_sn"))?),
                ("factory_calibrated", calibrated.clone()),
                ("calibration_date", calibrated),
                ("calibration_report", BLANK.to_string()),
                ("comment", BLANK.to_string()),
            ]),
        );
    }

    Ok(devices)
}

fn measured(source: &str, long_name: &str, units: &str) -> VariableSpec {
    VariableSpec::new(source)
        .attr("long_name", long_name)
        .attr("units", units)
        .attr(FILL_VALUE_ATTR, DEFAULT_FILL_VALUE)
}

fn position(source: &str, axis: &str, units: &str, limit: f64) -> VariableSpec {
    let long_name = if axis == "latitude" { "Latitude" } else { "Longitude" };
    measured(source, long_name, units)
        .attr("standard_name", axis)
        .attr("comment", "Estimated between surface fixes")
        .attr("observation_type", "measured")
        .attr("platform", "platform")
        .attr("reference", "WGS84")
        .attr("coordinate_reference_frame", "urn:ogc:crs:EPSG::4326")
        .range(-limit, limit)
}

fn ctd(spec: VariableSpec, accuracy: f64, precision: f64) -> VariableSpec {
    spec.attr("instrument", "instrument_ctd")
        .attr("observation_type", "measured")
        .attr("accuracy", accuracy)
        .attr("precision", precision)
}

pub fn default_netcdf_variables(
    record: &DeploymentRecord,
) -> Result<BTreeMap<String, VariableSpec>> {
    let mut vars = BTreeMap::new();
    let mut add = |name: &str, spec: VariableSpec| {
        vars.insert(name.to_string(), spec);
    };

    add(
        "time",
        VariableSpec::new("sci_m_present_time")
            .attr("long_name", "Time")
            .attr("standard_name", "time")
            .attr("calendar", "gregorian")
            .attr("units", TIME_UNITS)
            .attr("observation_type", "measured"),
    );
    add("latitude", position("m_gps_lat", "latitude", "degrees_north", 90.0));
    add("longitude", position("m_gps_lon", "longitude", "degrees_east", 180.0));
    add(
        "heading",
        measured("m_heading", "Glider Heading Angle", "rad")
            .attr("standard_name", "platform_orientation"),
    );
    add(
        "pitch",
        measured("m_pitch", "Glider Pitch Angle", "rad")
            .attr("standard_name", "platform_pitch_angle"),
    );
    add(
        "roll",
        measured("m_roll", "Glider Roll Angle", "rad").attr("standard_name", "platform_roll_angle"),
    );
    add(
        "conductivity",
        ctd(
            measured("sci_water_cond", "Conductivity", "S m-1")
                .attr("standard_name", "sea_water_electrical_conductivity"),
            0.0003,
            0.0001,
        )
        .range(0.0, 10.0)
        .resolution(0.00002),
    );
    add(
        "temperature",
        ctd(
            measured("sci_water_temp", "Temperature", "Celsius")
                .attr("standard_name", "sea_water_temperature"),
            0.002,
            0.001,
        )
        .range(-5.0, 50.0)
        .resolution(0.0002),
    );
    add(
        "pressure",
        ctd(
            measured("sci_water_pressure", "Pressure", "dbar")
                .attr("standard_name", "sea_water_pressure")
                .attr("positive", "down")
                .attr("reference_datum", "sea-surface")
                .attr("comment", "ctd pressure sensor"),
            1.0,
            2.0,
        )
        .conversion("bar2dbar")
        .range(0.0, 2000.0)
        .resolution(0.02),
    );
    add(
        "water_velocity_eastward",
        measured("m_water_vx", "Depth-Averaged Eastward Sea Water Velocity", "m s-1")
            .attr("standard_name", "barotropic_eastward_sea_water_velocity"),
    );
    add(
        "water_velocity_northward",
        measured("m_water_vy", "Depth-Averaged Northward Sea Water Velocity", "m s-1")
            .attr("standard_name", "barotropic_northward_sea_water_velocity"),
    );

    if record.flag("wetlabs_installed")? {
        add(
            "chlorophyll",
            measured("sci_flbbcd_chlor_units", "Chlorophyll", "mg m-3")
                .attr("standard_name", "concentration_of_chlorophyll_in_sea_water")
                .range(0.0, 50.0)
                .resolution(0.007),
        );
        add(
            "cdom",
            measured("sci_flbbcd_cdom_units", "Colored Dissolved Organic Matter", "ppb")
                .range(0.0, 375.0)
                .resolution(0.08),
        );
        add(
            "backscatter_700",
            measured("sci_flbbcd_bb_units", "700 nm Wavelength Backscatter", "1")
                .range(0.0, 5.0)
                .resolution(0.000002),
        );
    }
    if record.flag("oxy_installed")? {
        add(
            "oxygen_concentration",
            measured("sci_oxy4_oxygen", "Oxygen Concentration", "umol l-1")
                .attr(
                    "standard_name",
                    "mole_concentration_of_dissolved_molecular_oxygen_in_sea_water",
                )
                .attr("accuracy", 8.0)
                .range(0.0, 500.0)
                .resolution(1.0),
        );
    }
    if record.flag("par_installed")? {
        add(
            "par",
            measured("sci_bsipar_par", "Photosynthetically Active Radiation", "umol m-2 s-1")
                .attr(
                    "standard_name",
                    "downwelling_photosynthetic_photon_spherical_irradiance_in_sea_water",
                )
                .range(0.0, 6000.0),
        );
    }
    if record.flag("bb3_installed")? {
        for (wavelength, resolution) in [("470", 0.00001), ("532", 0.000006), ("660", 0.0000035)] {
            add(
                &format!("backscatter_{wavelength}"),
                measured(
                    &format!("sci_bb3slo_b{wavelength}_scaled"),
                    &format!("{wavelength} nm Wavelength Backscatter"),
                    "1",
                )
                .range(0.0, 5.0)
                .resolution(resolution),
            );
        }
    }
    if record.flag("lisst_installed")? {
        add(
            "total_volume_concentration",
            measured("sci_lisst_totvol", "Total Volume Concentration of Particles", "uL L-1")
                .range(0.5, 700.0)
                .resolution(0.1),
        );
        add(
            "mean_size",
            measured("sci_lisst_meansize", "Mean Particle Size", "um").range(1.0, 500.0),
        );
        add(
            "beam_attenuation",
            measured("sci_lisst_beamc", "Beam Attenuation", "m-1")
                .range(0.3, 0.99)
                .resolution(0.1),
        );
    }

    Ok(vars)
}

fn profile_attrs(pairs: Vec<(&str, AttrValue)>) -> Attributes {
    let mut attrs: Attributes = pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    attrs.insert(FILL_VALUE_ATTR.to_string(), AttrValue::Float(DEFAULT_FILL_VALUE));
    attrs
}

fn calculated(long_name: &str, standard_name: &str, comment: &str) -> Vec<(&'static str, AttrValue)> {
    vec![
        ("comment", comment.into()),
        ("long_name", long_name.into()),
        ("observation_type", "calculated".into()),
        ("platform", "platform".into()),
        ("standard_name", standard_name.into()),
    ]
}

fn bounded(mut pairs: Vec<(&'static str, AttrValue)>, units: &str, limit: f64) -> Vec<(&'static str, AttrValue)> {
    pairs.push(("units", units.into()));
    pairs.push(("valid_min", AttrValue::Float(-limit)));
    pairs.push(("valid_max", AttrValue::Float(limit)));
    pairs
}

pub fn default_profile_variables(
    record: &DeploymentRecord,
) -> Result<BTreeMap<String, Attributes>> {
    let ctd_cal = iso_midnight(record.date("ctd_cal")?);
    let ctd_type = record.text("ctd_type")?;
    let ctd_sn = record.text("ctd_sn")?;

    let mut vars = BTreeMap::new();
    let mut add = |name: &str, pairs: Vec<(&str, AttrValue)>| {
        vars.insert(name.to_string(), profile_attrs(pairs));
    };

    add(
        "profile_id",
        vec![
            (
                "comment",
                "Sequential profile number within the trajectory.  This value is unique in \
each file that is part of a single trajectory/deployment."
                    .into(),
            ),
            ("long_name", "Profile ID".into()),
            ("valid_max", AttrValue::Int(2147483647)),
            ("valid_min", AttrValue::Int(1)),
        ],
    );
    add(
        "profile_time",
        calculated(
            "Profile Center Time",
            "time",
            "Timestamp corresponding to the mid-point of the profile",
        ),
    );
    add(
        "profile_time_start",
        calculated(
            "Profile Start Time",
            "time",
            "Timestamp corresponding to the start of the profile",
        ),
    );
    add(
        "profile_time_end",
        calculated(
            "Profile End Time",
            "time",
            "Timestamp corresponding to the end of the profile",
        ),
    );
    add(
        "profile_lat",
        bounded(
            calculated(
                "Profile Center Latitude",
                "latitude",
                "Value is interpolated to provide an estimate of the latitude at the \
mid-point of the profile",
            ),
            "degrees_north",
            90.0,
        ),
    );
    add(
        "profile_lon",
        bounded(
            calculated(
                "Profile Center Longitude",
                "longitude",
                "Value is interpolated to provide an estimate of the longitude at the \
mid-point of the profile",
            ),
            "degrees_east",
            180.0,
        ),
    );
    add(
        "u",
        bounded(
            calculated(
                "Depth-Averaged Eastward Sea Water Velocity",
                "eastward_sea_water_velocity",
                DEPTH_AVERAGED_COMMENT,
            ),
            "m s-1",
            10.0,
        ),
    );
    add(
        "v",
        bounded(
            calculated(
                "Depth-Averaged Northward Sea Water Velocity",
                "northward_sea_water_velocity",
                DEPTH_AVERAGED_COMMENT,
            ),
            "m s-1",
            10.0,
        ),
    );
    add(
        "lon_uv",
        bounded(
            calculated("Depth-Averaged Longitude", "longitude", DEPTH_AVERAGED_COMMENT),
            "degrees_east",
            180.0,
        ),
    );
    add(
        "lat_uv",
        bounded(
            calculated("Depth-Averaged Latitude", "latitude", DEPTH_AVERAGED_COMMENT),
            "degrees_north",
            90.0,
        ),
    );
    add(
        "time_uv",
        vec![
            ("comment", DEPTH_AVERAGED_COMMENT.into()),
            ("long_name", "Depth-Averaged Time".into()),
            ("standard_name", "time".into()),
            ("calendar", "gregorian".into()),
            ("units", TIME_UNITS.into()),
            ("observation_type", "calculated".into()),
        ],
    );
    add(
        "instrument_ctd",
        vec![
            ("comment", "pumped CTD".into()),
            ("calibration_date", ctd_cal.clone().into()),
            ("calibration_report", BLANK.into()),
            ("factory_calibrated", ctd_cal.into()),
            ("long_name", "Seabird Glider Payload CTD".into()),
            ("make_model", format!("Seabird {ctd_type}").into()),
            ("platform", "platform".into()),
            ("serial_number", ctd_sn.into()),
            ("type", "platform".into()),
        ],
    );

    Ok(vars)
}
