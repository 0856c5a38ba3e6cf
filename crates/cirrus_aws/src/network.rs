//! Network topology builder.
//!
//! Derives per-AZ public and private subnet collections from a base CIDR
//! block and exposes them as list-valued attributes of the network
//! resource. Consumers of `private_subnet_ids` therefore acquire the
//! ordering edge against the network automatically; there is no
//! side-channel subnet list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, ResourceId, ResourceKind, UnitId, Value};

use crate::error::{AwsError, AwsResult};

/// An IPv4 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    addr: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Parse dotted-quad `a.b.c.d/prefix` notation.
    pub fn parse(s: &str) -> AwsResult<Self> {
        let invalid = || AwsError::InvalidCidr(s.to_string());

        let (quad, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix > 32 {
            return Err(invalid());
        }

        let mut addr: u32 = 0;
        let mut octets = 0;
        for part in quad.split('.') {
            let octet: u8 = part.parse().map_err(|_| invalid())?;
            addr = (addr << 8) | u32::from(octet);
            octets += 1;
        }
        if octets != 4 {
            return Err(invalid());
        }

        // Mask off host bits so 10.1.3.7/16 normalizes to 10.1.0.0/16.
        let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
        Ok(Self {
            addr: addr & mask,
            prefix,
        })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// The `index`-th child block of size `/new_prefix`.
    pub fn subnet(&self, new_prefix: u8, index: u32) -> AwsResult<Ipv4Cidr> {
        if new_prefix <= self.prefix || new_prefix > 32 {
            return Err(AwsError::InvalidCidr(format!(
                "/{new_prefix} does not subdivide {self}"
            )));
        }
        // Capacity in u64: a /0 parent split into /32s needs the full
        // 32-bit shift, which would overflow u32.
        let capacity = 1u64 << (new_prefix - self.prefix);
        if u64::from(index) >= capacity {
            return Err(AwsError::CidrExhausted {
                cidr: self.to_string(),
                requested: index as usize + 1,
                prefix: new_prefix,
            });
        }
        let step = 1u32 << (32 - new_prefix);
        Ok(Ipv4Cidr {
            addr: self.addr + index * step,
            prefix: new_prefix,
        })
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}/{}",
            (self.addr >> 24) & 0xff,
            (self.addr >> 16) & 0xff,
            (self.addr >> 8) & 0xff,
            self.addr & 0xff,
            self.prefix
        )
    }
}

/// Declarative description of a network resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub cidr: String,
    pub nat_gateways: u32,
    pub availability_zones: Vec<String>,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidr: "10.0.0.0/16".to_string(),
            nat_gateways: 1,
            availability_zones: vec!["us-east-1a".to_string(), "us-east-1b".to_string()],
        }
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    pub fn with_nat_gateways(mut self, count: u32) -> Self {
        self.nat_gateways = count;
        self
    }

    pub fn with_availability_zones(mut self, azs: Vec<String>) -> Self {
        self.availability_zones = azs;
        self
    }

    /// Declare the network resource with its derived subnet layout.
    ///
    /// One public and one private subnet per availability zone, carved as
    /// consecutive /24 blocks in AZ declaration order (publics first), so
    /// the layout is identical across synthesis runs.
    pub fn instantiate(&self, app: &mut App, unit: UnitId) -> AwsResult<Network> {
        if self.availability_zones.is_empty() {
            return Err(AwsError::NoAvailabilityZones);
        }
        let base = Ipv4Cidr::parse(&self.cidr)?;
        if base.prefix() >= 24 {
            return Err(AwsError::InvalidCidr(format!(
                "{} leaves no room for /24 subnets",
                self.cidr
            )));
        }

        let subnet_entry = |az: &str, cidr: &Ipv4Cidr| {
            let mut entry = BTreeMap::new();
            entry.insert("availability_zone".to_string(), Value::literal(az));
            entry.insert("cidr".to_string(), Value::literal(cidr.to_string()));
            Value::Map(entry)
        };

        let az_count = self.availability_zones.len() as u32;
        let mut public_subnets = Vec::new();
        let mut private_subnets = Vec::new();
        for (i, az) in self.availability_zones.iter().enumerate() {
            let public = base.subnet(24, i as u32)?;
            let private = base.subnet(24, az_count + i as u32)?;
            public_subnets.push(subnet_entry(az, &public));
            private_subnets.push(subnet_entry(az, &private));
        }

        let mut inputs = BTreeMap::new();
        inputs.insert("cidr".to_string(), Value::literal(self.cidr.clone()));
        inputs.insert(
            "nat_gateways".to_string(),
            Value::Number(i64::from(self.nat_gateways)),
        );
        inputs.insert(
            "availability_zones".to_string(),
            Value::List(
                self.availability_zones
                    .iter()
                    .map(|az| Value::literal(az.as_str()))
                    .collect(),
            ),
        );
        inputs.insert("public_subnets".to_string(), Value::List(public_subnets));
        inputs.insert("private_subnets".to_string(), Value::List(private_subnets));

        let id = app.declare(unit, ResourceKind::Network, self.name.as_str(), inputs)?;
        Ok(Network { id })
    }
}

/// Handle to a declared network resource.
#[derive(Debug, Clone, Copy)]
pub struct Network {
    pub id: ResourceId,
}

impl Network {
    pub fn vpc_id_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "vpc_id")
    }

    pub fn cidr_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "cidr")
    }

    /// Ordered public subnet ids, AZ declaration order.
    pub fn public_subnet_ids_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "public_subnet_ids")
    }

    /// Ordered private subnet ids, AZ declaration order.
    pub fn private_subnet_ids_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "private_subnet_ids")
    }
}

/// Ingress protocols the rule set understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub source: String,
    pub port: u16,
    pub protocol: Protocol,
    pub description: String,
}

/// A security rule set scoped to a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRulesSpec {
    pub name: String,
    pub description: String,
    pub allow_all_outbound: bool,
    rules: Vec<IngressRule>,
}

impl SecurityRulesSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            allow_all_outbound: true,
            rules: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_allow_all_outbound(mut self, allow: bool) -> Self {
        self.allow_all_outbound = allow;
        self
    }

    /// Append an ingress rule.
    ///
    /// Idempotent by (source, port, protocol): re-declaring an identical
    /// rule keeps the first declaration and is a no-op.
    pub fn allow_ingress(
        &mut self,
        source: impl Into<String>,
        port: u16,
        protocol: Protocol,
        description: impl Into<String>,
    ) {
        let source = source.into();
        if self
            .rules
            .iter()
            .any(|r| r.source == source && r.port == port && r.protocol == protocol)
        {
            return;
        }
        self.rules.push(IngressRule {
            source,
            port,
            protocol,
            description: description.into(),
        });
    }

    pub fn rules(&self) -> &[IngressRule] {
        &self.rules
    }

    pub fn instantiate(
        &self,
        app: &mut App,
        unit: UnitId,
        network: &Network,
    ) -> AwsResult<SecurityRules> {
        let ingress = self
            .rules
            .iter()
            .map(|rule| {
                let mut entry = BTreeMap::new();
                entry.insert("source".to_string(), Value::literal(rule.source.as_str()));
                entry.insert("port".to_string(), Value::Number(i64::from(rule.port)));
                entry.insert(
                    "protocol".to_string(),
                    Value::literal(rule.protocol.as_str()),
                );
                entry.insert(
                    "description".to_string(),
                    Value::literal(rule.description.as_str()),
                );
                Value::Map(entry)
            })
            .collect();

        let mut inputs = BTreeMap::new();
        inputs.insert("vpc_id".to_string(), Value::Ref(network.vpc_id_ref()));
        inputs.insert("description".to_string(), Value::literal(self.description.as_str()));
        inputs.insert(
            "allow_all_outbound".to_string(),
            Value::Bool(self.allow_all_outbound),
        );
        inputs.insert("ingress".to_string(), Value::List(ingress));

        let id = app.declare(unit, ResourceKind::SecurityRules, self.name.as_str(), inputs)?;
        Ok(SecurityRules { id })
    }
}

/// Handle to a declared security rule set.
#[derive(Debug, Clone, Copy)]
pub struct SecurityRules {
    pub id: ResourceId,
}

impl SecurityRules {
    pub fn group_id_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "security_group_id")
    }
}
