//! Address-qualified contract dependencies of a script or transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;
use crate::parser::{parse_program, ImportLocation, Program};
use crate::types::Address;

/// One contract imported from an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub address: Address,
    pub name: String,
}

impl Import {
    /// Type-id prefix of the contract, e.g. `A.1654653399040a61.FlowToken`.
    pub fn identifier(&self) -> String {
        format!("A.{}.{}", self.address.hex(), self.name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.name, self.address)
    }
}

impl Program {
    /// Imports bound to an explicit address, one per imported identifier,
    /// in source order.
    pub fn address_imports(&self) -> Vec<Import> {
        self.imports
            .iter()
            .filter_map(|decl| match decl.location {
                ImportLocation::Address(address) => Some((address, &decl.identifiers)),
                _ => None,
            })
            .flat_map(|(address, identifiers)| {
                identifiers.iter().map(move |name| Import {
                    address,
                    name: name.clone(),
                })
            })
            .collect()
    }
}

/// Parse `code` and return its address imports.
pub fn address_imports(code: &[u8]) -> Result<Vec<Import>, ParseError> {
    Ok(parse_program(code)?.address_imports())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &[u8] = br#"
        import FungibleToken from 0xf233dcee88fe0abe
        import FlowToken, FlowFees from 0x1654653399040a61
        import "MetadataViews"
        import Crypto

        transaction(amount: UFix64) {
            prepare(signer: &Account) {}
        }
    "#;

    #[test]
    fn extracts_address_imports_in_order() {
        let imports = address_imports(CODE).unwrap();
        let names: Vec<_> = imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["FungibleToken", "FlowToken", "FlowFees"]);
        assert_eq!(imports[1].address.to_string(), "0x1654653399040a61");
    }

    #[test]
    fn identifier_format() {
        let imports = address_imports(CODE).unwrap();
        assert_eq!(imports[0].identifier(), "A.f233dcee88fe0abe.FungibleToken");
    }

    #[test]
    fn short_addresses_are_padded() {
        let imports = address_imports(b"import Foo from 0x01").unwrap();
        assert_eq!(imports[0].identifier(), "A.0000000000000001.Foo");
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = address_imports(CODE).unwrap();
        let second = address_imports(CODE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_source_is_a_parse_error() {
        assert!(address_imports(b"import Foo from 0x01\ntransaction( {").is_err());
    }
}
