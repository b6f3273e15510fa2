use super::Serialize;
use byteorder::WriteBytesExt;
use std::io::Result;

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// Class file major version of Java SE 1.0.2 to 1.1, after which every feature release
    /// increments the major version by one
    const JAVA1_MAJOR: u16 = 45;

    const fn java(feature: u16) -> Version {
        Version {
            major_version: Self::JAVA1_MAJOR - 1 + feature,
            minor_version: 0,
        }
    }

    pub const JAVA6: Version = Version::java(6);
    pub const JAVA7: Version = Version::java(7);

    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version::java(8);
    pub const JAVA11: Version = Version::java(11);
    pub const JAVA17: Version = Version::java(17);

    /// Java SE feature release this version corresponds to (eg. `8` for major version 52)
    pub fn feature_release(&self) -> u16 {
        self.major_version.saturating_sub(Self::JAVA1_MAJOR - 1)
    }

    /// Interpret a `java.version` style string reported by a running VM
    ///
    /// Handles both the legacy `1.8.0_292` scheme and the newer `17.0.2` / `9-ea` scheme. Returns
    /// `None` for strings that don't start with a release number.
    pub fn from_platform_version(version: &str) -> Option<Version> {
        let mut components = version
            .trim()
            .split(|c: char| !c.is_ascii_digit())
            .map(|component| component.parse::<u16>().ok());
        let feature = match components.next()?? {
            1 => components.next()??,
            feature => feature,
        };
        if (1..=Self::JAVA1_MAJOR).contains(&feature) {
            Some(Version::java(feature.max(2)))
        } else {
            None
        }
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platform_versions() {
        assert_eq!(Version::from_platform_version("1.8.0_292"), Some(Version::JAVA8));
        assert_eq!(Version::from_platform_version("1.6.0"), Some(Version::JAVA6));
        assert_eq!(Version::from_platform_version("11.0.12"), Some(Version::JAVA11));
        assert_eq!(Version::from_platform_version("17"), Some(Version::JAVA17));
        assert_eq!(
            Version::from_platform_version("9-ea").map(|v| v.major_version),
            Some(53)
        );
        assert_eq!(Version::from_platform_version("OpenJDK"), None);
        assert_eq!(Version::from_platform_version(""), None);
    }

    #[test]
    fn feature_release() {
        assert_eq!(Version::JAVA8.major_version, 52);
        assert_eq!(Version::JAVA8.feature_release(), 8);
        assert_eq!(Version::JAVA17.major_version, 61);
    }
}
